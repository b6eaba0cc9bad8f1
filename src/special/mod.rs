//! Special ops: the typed call shapes every implementation exposes.
//!
//! An op shape is an [`Arity`] (0, 1 or 2 typed inputs) combined with one or
//! more [`Flavor`]s:
//!
//! - **Computer**: the caller supplies the output, which must not alias an
//!   input. Pre-existing output contents never influence the result.
//! - **Function**: the op allocates and returns a fresh output.
//! - **Inplace**: one reference serves as both input and output.
//!
//! Hybrids expose several flavors on one instance. Each exposed flavor
//! behaves exactly like its pure counterpart.
//!
//! Aliasing an output with an input, or mutating an input of a computer or
//! function, is a caller error that is not checked at runtime.

pub mod adapt;
pub mod computer;
pub mod function;
pub mod handle;
pub mod hybrid;
pub mod inplace;
pub mod module;

pub use adapt::{FixedInput, FixedSecond};
pub use computer::{BinaryComputerOp, NullaryComputerOp, UnaryComputerOp};
pub use function::{BinaryFunctionOp, NullaryFunctionOp, UnaryFunctionOp};
pub use handle::{InstanceId, OpHandle};
pub use hybrid::{
    BinaryHybridCF, BinaryHybridCFI, BinaryHybridCFI1, BinaryOutputFactory, NullaryHybridCF,
    NullaryOutputFactory, UnaryHybridCF, UnaryHybridCFI, UnaryHybridCI, UnaryOutputFactory,
};
pub use inplace::{BinaryInplace1Op, BinaryInplaceOp, UnaryInplaceOp};
pub use module::{BinaryModule, Module, UnaryModule};

use crate::core::error::OpResult;
use crate::core::types::Value;
use crate::matching::OpEnvironment;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Taxonomy
// ============================================================================

/// Number of strongly-typed inputs an op declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Arity {
    Nullary,
    Unary,
    Binary,
}

impl Arity {
    /// Numeric input count.
    pub fn count(self) -> usize {
        match self {
            Arity::Nullary => 0,
            Arity::Unary => 1,
            Arity::Binary => 2,
        }
    }

    /// Arity with the given input count, if one exists.
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            0 => Some(Arity::Nullary),
            1 => Some(Arity::Unary),
            2 => Some(Arity::Binary),
            _ => None,
        }
    }
}

/// Call-shape family of an op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flavor {
    Computer,
    Function,
    Inplace,
}

/// Every op shape an implementation can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialType {
    NullaryComputer,
    UnaryComputer,
    BinaryComputer,
    NullaryFunction,
    UnaryFunction,
    BinaryFunction,
    UnaryInplace,
    BinaryInplace1,
    BinaryInplace,
    NullaryHybridCF,
    UnaryHybridCF,
    BinaryHybridCF,
    UnaryHybridCI,
    UnaryHybridCFI,
    BinaryHybridCFI1,
    BinaryHybridCFI,
}

impl SpecialType {
    /// All shapes, pure flavors first.
    pub const ALL: [SpecialType; 16] = [
        SpecialType::NullaryComputer,
        SpecialType::UnaryComputer,
        SpecialType::BinaryComputer,
        SpecialType::NullaryFunction,
        SpecialType::UnaryFunction,
        SpecialType::BinaryFunction,
        SpecialType::UnaryInplace,
        SpecialType::BinaryInplace1,
        SpecialType::BinaryInplace,
        SpecialType::NullaryHybridCF,
        SpecialType::UnaryHybridCF,
        SpecialType::BinaryHybridCF,
        SpecialType::UnaryHybridCI,
        SpecialType::UnaryHybridCFI,
        SpecialType::BinaryHybridCFI1,
        SpecialType::BinaryHybridCFI,
    ];

    /// Declared arity of the shape.
    pub fn arity(self) -> Arity {
        use SpecialType::*;
        match self {
            NullaryComputer | NullaryFunction | NullaryHybridCF => Arity::Nullary,
            UnaryComputer | UnaryFunction | UnaryInplace | UnaryHybridCF | UnaryHybridCI
            | UnaryHybridCFI => Arity::Unary,
            BinaryComputer | BinaryFunction | BinaryInplace1 | BinaryInplace | BinaryHybridCF
            | BinaryHybridCFI1 | BinaryHybridCFI => Arity::Binary,
        }
    }

    /// Flavors exposed by the shape.
    pub fn flavors(self) -> &'static [Flavor] {
        use SpecialType::*;
        const C: &[Flavor] = &[Flavor::Computer];
        const F: &[Flavor] = &[Flavor::Function];
        const I: &[Flavor] = &[Flavor::Inplace];
        const CF: &[Flavor] = &[Flavor::Computer, Flavor::Function];
        const CI: &[Flavor] = &[Flavor::Computer, Flavor::Inplace];
        const CFI: &[Flavor] = &[Flavor::Computer, Flavor::Function, Flavor::Inplace];
        match self {
            NullaryComputer | UnaryComputer | BinaryComputer => C,
            NullaryFunction | UnaryFunction | BinaryFunction => F,
            UnaryInplace | BinaryInplace1 | BinaryInplace => I,
            NullaryHybridCF | UnaryHybridCF | BinaryHybridCF => CF,
            UnaryHybridCI => CI,
            UnaryHybridCFI | BinaryHybridCFI1 | BinaryHybridCFI => CFI,
        }
    }

    /// Check if the shape unions several flavors.
    pub fn is_hybrid(self) -> bool {
        self.flavors().len() > 1
    }

    /// Check if an op of this shape can be used where `other` is expected.
    ///
    /// A higher-arity shape subsumes the lower-arity one with the extra
    /// inputs held fixed, so arity only needs to be at least `other`'s.
    pub fn implements(self, other: SpecialType) -> bool {
        if self.arity() < other.arity() {
            return false;
        }
        // BinaryInplace also needs mutate2, which BinaryInplace1 lacks.
        if other == SpecialType::BinaryInplace
            && !matches!(self, SpecialType::BinaryInplace | SpecialType::BinaryHybridCFI)
        {
            return false;
        }
        other.flavors().iter().all(|f| self.flavors().contains(f))
    }
}

impl fmt::Display for SpecialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Whether one instance may serve concurrent callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Concurrency {
    /// No per-call mutable state; one instance can be shared.
    #[default]
    Shared,
    /// Owns scratch state; every concurrent caller needs its own instance.
    Independent,
}

// ============================================================================
// Base Trait
// ============================================================================

/// Base trait of every special op.
pub trait SpecialOp: Send + Sync {
    /// The richest shape this op implements.
    fn special_type(&self) -> SpecialType;

    /// Declared arity. Reflects the declared shape, not a recomputed minimum.
    fn arity(&self) -> Arity {
        self.special_type().arity()
    }

    /// Check the binding after instantiation.
    ///
    /// Returning `false` makes the matcher drop this candidate and try the
    /// next one.
    fn conforms(&self) -> bool {
        true
    }

    /// One-time setup before first use, e.g. resolving helper ops.
    fn initialize(&mut self, _env: &OpEnvironment) -> OpResult<()> {
        Ok(())
    }

    /// Sharing policy used by [`OpHandle::independent_instance`].
    fn concurrency(&self) -> Concurrency {
        Concurrency::Shared
    }
}

/// Op callable with dynamically typed values.
///
/// Backs [`OpEnvironment::run`], the generic by-name call path.
pub trait DynamicOp: SpecialOp {
    /// Call the op with positional inputs.
    fn call(&self, inputs: &[Value]) -> OpResult<Value>;
}
