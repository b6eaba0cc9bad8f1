//! Core types for imops.
//!
//! This module contains the foundations every other layer builds on:
//! - Error types and match reports
//! - Type descriptors and dynamic values
//! - Addressable-element containers
//! - Runtime configuration

pub mod config;
pub mod error;
pub mod img;
pub mod types;

// Re-export commonly used types
pub use config::{ExecutionMode, OpsConfig};
pub use error::{
    ConfigError, InstantiationError, InstantiationResult, MatchError, MatchReport, OpResult,
    OpsError, RejectReason, Rejection,
};
pub use img::{ArrayImg, Dims, Interval, Labeling, LabelingMapping, RealPixel};
pub use types::{DataType, FromValue, ImageMeta, OpFamily, OpType, Typed, Value};
