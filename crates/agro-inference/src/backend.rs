//! Burn backend used for on-device inference.
//!
//! Inference never needs gradients, so this is the plain CPU backend
//! without `Autodiff`.

use burn::tensor::backend::Backend;
use burn_ndarray::NdArray;

/// Backend the local classifier runs on
pub type InferenceBackend = NdArray<f32>;

/// Get a human-readable name for the inference backend
pub fn backend_name() -> &'static str {
    "NdArray (CPU)"
}

/// Get the default device for the inference backend
pub fn default_device() -> <InferenceBackend as Backend>::Device {
    <InferenceBackend as Backend>::Device::default()
}
