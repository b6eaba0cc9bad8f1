//! # Imops - Special-op matching for n-dimensional images
//!
//! Imops lets callers ask for an operation by name and by the exact typed
//! call shape they intend to use, and hands back the best registered
//! implementation for those argument types.
//!
//! ## Features
//!
//! - **Special ops**: computers, functions, inplace ops and their hybrids,
//!   for zero, one or two typed inputs
//! - **Matching**: priority and type-specificity ranking with conformance
//!   checks and a structured report when nothing fits
//! - **Mapping**: apply an element-level op across whole images, sequentially
//!   or in parallel chunks
//! - **Dynamic calls**: run an op by name with loosely typed values
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imops::prelude::*;
//!
//! let env = OpEnvironment::with_builtins()?;
//!
//! // Resolve a subtract op for u8 elements with the constant bound.
//! let sub = env
//!     .op("math.subtract")
//!     .arg(5.0)
//!     .unary_computer::<u8, u8>()?;
//!
//! // Apply it to every element of an image.
//! let input = ArrayImg::from_fn(Dims::new([10, 10]), |c| (c[0] + 10 * c[1]) as u8);
//! let mut output = input.create_like();
//! env.mapper().map_unary(&sub, &input, &mut output)?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: errors, type descriptors, dynamic values, images, config
//! - [`special`]: the typed op traits and the handle the matcher returns
//! - [`matching`]: registry, requests, candidate query and the matcher
//! - [`map`]: element-wise mapping of ops over images
//! - [`ops`]: built-in op implementations
//!
//! ## Writing an Op
//!
//! Implement [`SpecialOp`](special::SpecialOp) plus the flavor traits the op
//! offers, then register it with the views it can be asked for:
//!
//! ```rust,ignore
//! use imops::prelude::*;
//!
//! struct Negate;
//!
//! impl SpecialOp for Negate {
//!     fn special_type(&self) -> SpecialType {
//!         SpecialType::UnaryComputer
//!     }
//! }
//!
//! impl UnaryComputerOp<f64, f64> for Negate {
//!     fn compute1(&self, input: &f64, output: &mut f64) -> OpResult<()> {
//!         *output = -input;
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = OpRegistry::new();
//! registry.register(
//!     OpInfo::builder("math.negate.f64", "math.negate")
//!         .input("in", DataType::Double)
//!         .output(DataType::Double)
//!         .build(),
//!     Views::new(|_: &OpArgs| Ok(Negate)).unary_computer::<f64, f64>(),
//! )?;
//! ```

#![warn(clippy::all)]

pub mod core;
pub mod map;
pub mod matching;
pub mod ops;
pub mod special;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use imops::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::img::{ArrayImg, Dims, Interval, Labeling, LabelingMapping, RealPixel};
    pub use crate::core::types::{DataType, OpFamily, OpType, Typed, Value};

    // Errors
    pub use crate::core::error::{
        InstantiationError, MatchError, MatchReport, OpResult, OpsError, RejectReason,
    };

    // Config
    pub use crate::core::config::{ExecutionMode, OpsConfig};

    // Special ops
    pub use crate::special::{
        Arity, BinaryComputerOp, BinaryFunctionOp, BinaryHybridCF, BinaryHybridCFI,
        BinaryHybridCFI1, BinaryInplace1Op, BinaryInplaceOp, Concurrency, DynamicOp, Flavor,
        NullaryComputerOp, NullaryFunctionOp, NullaryHybridCF, OpHandle, SpecialOp, SpecialType,
        UnaryComputerOp, UnaryFunctionOp, UnaryHybridCF, UnaryHybridCFI, UnaryHybridCI,
        UnaryInplaceOp,
    };

    // Matching
    pub use crate::matching::{
        Matcher, OpArgs, OpEnvironment, OpInfo, OpRef, OpRegistry, Priority, Views,
    };

    // Mapping
    pub use crate::map::{Execution, Mapper};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
