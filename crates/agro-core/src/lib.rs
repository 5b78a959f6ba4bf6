//! Core types and utilities for AgroVision leaf diagnosis.
//!
//! This crate provides the foundational types shared across the workspace:
//! the diagnosis record, sensor snapshots, the PlantVillage knowledge base,
//! the sensor fusion rules and the application configuration.

pub mod cli;
pub mod config;
pub mod error;
pub mod fusion;
pub mod knowledge;
pub mod types;

pub use config::*;
pub use error::{Error, Result};
pub use fusion::{FusionEngine, FusionThresholds, SensorAlert};
pub use knowledge::{ClassRecord, KnowledgeEntry, KNOWLEDGE_BASE, NUM_CLASSES};
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{Error, Result};
    pub use crate::fusion::{FusionEngine, FusionThresholds, SensorAlert};
    pub use crate::knowledge::{decode, lookup, ClassRecord};
    pub use crate::types::*;
}
