//! Function ops: allocate and return a fresh output on every call.

use crate::core::error::OpResult;
use crate::special::SpecialOp;

/// Produces a new output from no inputs.
pub trait NullaryFunctionOp<O>: SpecialOp {
    fn calculate0(&self) -> OpResult<O>;
}

/// Produces a new output from one input, which is left untouched.
pub trait UnaryFunctionOp<I, O>: SpecialOp {
    fn calculate1(&self, input: &I) -> OpResult<O>;
}

/// Produces a new output from two inputs, which are left untouched.
pub trait BinaryFunctionOp<I1, I2, O>: SpecialOp {
    fn calculate2(&self, in1: &I1, in2: &I2) -> OpResult<O>;
}
