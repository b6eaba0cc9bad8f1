//! Computer ops: write into a caller-supplied output.

use crate::core::error::OpResult;
use crate::special::SpecialOp;

/// Computes an output from no inputs.
pub trait NullaryComputerOp<O>: SpecialOp {
    /// Fill `output`. Its previous contents are ignored.
    fn compute0(&self, output: &mut O) -> OpResult<()>;
}

/// Computes an output from one input.
pub trait UnaryComputerOp<I, O>: SpecialOp {
    /// Fill `output` from `input`. `output` must not alias `input`.
    fn compute1(&self, input: &I, output: &mut O) -> OpResult<()>;
}

/// Computes an output from two inputs.
pub trait BinaryComputerOp<I1, I2, O>: SpecialOp {
    /// Fill `output` from both inputs. `output` must not alias either input.
    fn compute2(&self, in1: &I1, in2: &I2, output: &mut O) -> OpResult<()>;
}
