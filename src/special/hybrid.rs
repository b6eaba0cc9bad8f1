//! Hybrid ops: several flavors on one instance.
//!
//! A hybrid CF op is a computer that also knows how to allocate its own
//! output. Its function flavor delegates to [`calculate_unary`] (or the
//! nullary/binary variant), which creates the output and then runs the
//! computer, so both flavors produce identical contents by construction.
//!
//! ```rust,ignore
//! impl UnaryFunctionOp<f64, f64> for Square {
//!     fn calculate1(&self, input: &f64) -> OpResult<f64> {
//!         hybrid::calculate_unary(self, input)
//!     }
//! }
//! ```

use crate::core::error::OpResult;
use crate::special::{
    BinaryComputerOp, BinaryFunctionOp, BinaryInplace1Op, BinaryInplaceOp, NullaryComputerOp,
    NullaryFunctionOp, UnaryComputerOp, UnaryFunctionOp, UnaryInplaceOp,
};

// ============================================================================
// Output Factories
// ============================================================================

/// Allocates the output of a nullary op.
pub trait NullaryOutputFactory<O> {
    fn create_output(&self) -> O;
}

/// Allocates the output of a unary op, typically shaped like the input.
pub trait UnaryOutputFactory<I, O> {
    fn create_output(&self, input: &I) -> O;
}

/// Allocates the output of a binary op.
pub trait BinaryOutputFactory<I1, I2, O> {
    fn create_output(&self, in1: &I1, in2: &I2) -> O;
}

/// Function flavor of a nullary hybrid: create the output, then compute.
pub fn calculate_nullary<T, O>(op: &T) -> OpResult<O>
where
    T: NullaryComputerOp<O> + NullaryOutputFactory<O> + ?Sized,
{
    let mut output = op.create_output();
    op.compute0(&mut output)?;
    Ok(output)
}

/// Function flavor of a unary hybrid: create the output, then compute.
pub fn calculate_unary<T, I, O>(op: &T, input: &I) -> OpResult<O>
where
    T: UnaryComputerOp<I, O> + UnaryOutputFactory<I, O> + ?Sized,
{
    let mut output = op.create_output(input);
    op.compute1(input, &mut output)?;
    Ok(output)
}

/// Function flavor of a binary hybrid: create the output, then compute.
pub fn calculate_binary<T, I1, I2, O>(op: &T, in1: &I1, in2: &I2) -> OpResult<O>
where
    T: BinaryComputerOp<I1, I2, O> + BinaryOutputFactory<I1, I2, O> + ?Sized,
{
    let mut output = op.create_output(in1, in2);
    op.compute2(in1, in2, &mut output)?;
    Ok(output)
}

// ============================================================================
// Hybrid Shapes
// ============================================================================

/// Nullary computer + function.
pub trait NullaryHybridCF<O>:
    NullaryComputerOp<O> + NullaryFunctionOp<O> + NullaryOutputFactory<O>
{
}

impl<T, O> NullaryHybridCF<O> for T where
    T: NullaryComputerOp<O> + NullaryFunctionOp<O> + NullaryOutputFactory<O>
{
}

/// Unary computer + function.
pub trait UnaryHybridCF<I, O>:
    UnaryComputerOp<I, O> + UnaryFunctionOp<I, O> + UnaryOutputFactory<I, O>
{
}

impl<T, I, O> UnaryHybridCF<I, O> for T where
    T: UnaryComputerOp<I, O> + UnaryFunctionOp<I, O> + UnaryOutputFactory<I, O>
{
}

/// Unary computer + inplace.
pub trait UnaryHybridCI<A>: UnaryComputerOp<A, A> + UnaryInplaceOp<A> {}

impl<T, A> UnaryHybridCI<A> for T where T: UnaryComputerOp<A, A> + UnaryInplaceOp<A> {}

/// Unary computer + function + inplace.
pub trait UnaryHybridCFI<A>: UnaryHybridCF<A, A> + UnaryInplaceOp<A> {}

impl<T, A> UnaryHybridCFI<A> for T where T: UnaryHybridCF<A, A> + UnaryInplaceOp<A> {}

/// Binary computer + function.
pub trait BinaryHybridCF<I1, I2, O>:
    BinaryComputerOp<I1, I2, O> + BinaryFunctionOp<I1, I2, O> + BinaryOutputFactory<I1, I2, O>
{
}

impl<T, I1, I2, O> BinaryHybridCF<I1, I2, O> for T where
    T: BinaryComputerOp<I1, I2, O> + BinaryFunctionOp<I1, I2, O> + BinaryOutputFactory<I1, I2, O>
{
}

/// Binary computer + function + inplace on the first argument.
pub trait BinaryHybridCFI1<A, I>: BinaryHybridCF<A, I, A> + BinaryInplace1Op<A, I> {}

impl<T, A, I> BinaryHybridCFI1<A, I> for T where T: BinaryHybridCF<A, I, A> + BinaryInplace1Op<A, I> {}

/// Binary computer + function + inplace on either argument.
pub trait BinaryHybridCFI<A>: BinaryHybridCF<A, A, A> + BinaryInplaceOp<A> {}

impl<T, A> BinaryHybridCFI<A> for T where T: BinaryHybridCF<A, A, A> + BinaryInplaceOp<A> {}
