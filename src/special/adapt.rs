//! Arity subsumption by partial application.
//!
//! A binary op is usable wherever a unary op is expected once its second
//! input is held fixed, and a unary op becomes nullary once its input is
//! held fixed. The adapters forward every call and keep reporting the
//! wrapped op's declared shape.

use crate::core::error::OpResult;
use crate::special::{
    BinaryComputerOp, BinaryFunctionOp, BinaryInplace1Op, BinaryOutputFactory, Concurrency,
    NullaryComputerOp, NullaryFunctionOp, NullaryOutputFactory, OpHandle, SpecialOp, SpecialType,
    UnaryComputerOp, UnaryFunctionOp, UnaryInplaceOp, UnaryOutputFactory,
};
use std::sync::Arc;

/// Binary op with its second input held fixed.
pub struct FixedSecond<Op: ?Sized, I2> {
    op: Arc<Op>,
    in2: I2,
}

impl<Op: ?Sized, I2> FixedSecond<Op, I2> {
    /// Wrap `op`, passing `in2` as its second input on every call.
    pub fn new(op: Arc<Op>, in2: I2) -> Self {
        Self { op, in2 }
    }

    /// Wrap the op behind a handle.
    pub fn from_handle(handle: &OpHandle<Op>, in2: I2) -> Self {
        Self::new(handle.op().clone(), in2)
    }

    /// The fixed second input.
    pub fn in2(&self) -> &I2 {
        &self.in2
    }
}

impl<Op, I2> SpecialOp for FixedSecond<Op, I2>
where
    Op: SpecialOp + ?Sized,
    I2: Send + Sync,
{
    fn special_type(&self) -> SpecialType {
        self.op.special_type()
    }

    fn conforms(&self) -> bool {
        self.op.conforms()
    }

    fn concurrency(&self) -> Concurrency {
        self.op.concurrency()
    }
}

impl<Op, I1, I2, O> UnaryComputerOp<I1, O> for FixedSecond<Op, I2>
where
    Op: BinaryComputerOp<I1, I2, O> + ?Sized,
    I2: Send + Sync,
{
    fn compute1(&self, input: &I1, output: &mut O) -> OpResult<()> {
        self.op.compute2(input, &self.in2, output)
    }
}

impl<Op, I1, I2, O> UnaryFunctionOp<I1, O> for FixedSecond<Op, I2>
where
    Op: BinaryFunctionOp<I1, I2, O> + ?Sized,
    I2: Send + Sync,
{
    fn calculate1(&self, input: &I1) -> OpResult<O> {
        self.op.calculate2(input, &self.in2)
    }
}

impl<Op, I1, I2, O> UnaryOutputFactory<I1, O> for FixedSecond<Op, I2>
where
    Op: BinaryOutputFactory<I1, I2, O> + ?Sized,
{
    fn create_output(&self, input: &I1) -> O {
        self.op.create_output(input, &self.in2)
    }
}

impl<Op, A, I2> UnaryInplaceOp<A> for FixedSecond<Op, I2>
where
    Op: BinaryInplace1Op<A, I2> + ?Sized,
    I2: Send + Sync,
{
    fn mutate(&self, arg: &mut A) -> OpResult<()> {
        self.op.mutate1(arg, &self.in2)
    }
}

/// Unary op with its input held fixed.
pub struct FixedInput<Op: ?Sized, I> {
    op: Arc<Op>,
    input: I,
}

impl<Op: ?Sized, I> FixedInput<Op, I> {
    /// Wrap `op`, passing `input` on every call.
    pub fn new(op: Arc<Op>, input: I) -> Self {
        Self { op, input }
    }

    /// Wrap the op behind a handle.
    pub fn from_handle(handle: &OpHandle<Op>, input: I) -> Self {
        Self::new(handle.op().clone(), input)
    }
}

impl<Op, I> SpecialOp for FixedInput<Op, I>
where
    Op: SpecialOp + ?Sized,
    I: Send + Sync,
{
    fn special_type(&self) -> SpecialType {
        self.op.special_type()
    }

    fn conforms(&self) -> bool {
        self.op.conforms()
    }

    fn concurrency(&self) -> Concurrency {
        self.op.concurrency()
    }
}

impl<Op, I, O> NullaryComputerOp<O> for FixedInput<Op, I>
where
    Op: UnaryComputerOp<I, O> + ?Sized,
    I: Send + Sync,
{
    fn compute0(&self, output: &mut O) -> OpResult<()> {
        self.op.compute1(&self.input, output)
    }
}

impl<Op, I, O> NullaryFunctionOp<O> for FixedInput<Op, I>
where
    Op: UnaryFunctionOp<I, O> + ?Sized,
    I: Send + Sync,
{
    fn calculate0(&self) -> OpResult<O> {
        self.op.calculate1(&self.input)
    }
}

impl<Op, I, O> NullaryOutputFactory<O> for FixedInput<Op, I>
where
    Op: UnaryOutputFactory<I, O> + ?Sized,
{
    fn create_output(&self) -> O {
        self.op.create_output(&self.input)
    }
}
