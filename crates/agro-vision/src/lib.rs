//! Image handling for plant leaf diagnosis.
//!
//! This crate turns whatever the caller captured (a data URI, raw bytes or a
//! file on disk) into the fixed-shape tensor the leaf classifier expects.

pub mod payload;
pub mod preprocess;

pub use payload::ImagePayload;
pub use preprocess::{ImagePreprocessor, ImageTensor};

/// Default square edge length of the classifier input (MobileNet-style)
pub const IMAGE_SIZE: u32 = 224;

/// Number of colour channels fed to the classifier
pub const CHANNELS: usize = 3;
