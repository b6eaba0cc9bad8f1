//! Inplace ops: one argument is both input and output.

use crate::core::error::OpResult;
use crate::special::SpecialOp;

/// Mutates its single argument.
pub trait UnaryInplaceOp<A>: SpecialOp {
    fn mutate(&self, arg: &mut A) -> OpResult<()>;
}

/// Mutates its first argument, reading the second.
pub trait BinaryInplace1Op<A, I>: SpecialOp {
    fn mutate1(&self, arg: &mut A, in2: &I) -> OpResult<()>;
}

/// Mutates either argument, reading the other.
pub trait BinaryInplaceOp<A>: BinaryInplace1Op<A, A> {
    fn mutate2(&self, in1: &A, arg: &mut A) -> OpResult<()>;
}
