//! Complex-valued ops.

use crate::core::error::OpResult;
use crate::core::types::{DataType, OpFamily, Value};
use crate::matching::{OpArgs, OpInfo, OpRegistry, Views};
use crate::ops::typed_input;
use crate::special::{
    hybrid, DynamicOp, SpecialOp, SpecialType, UnaryComputerOp, UnaryFunctionOp,
    UnaryOutputFactory,
};
use num_complex::Complex64;

/// `complex.log` family.
pub struct Log;

impl OpFamily for Log {
    const NAME: &'static str = "complex.log";
}

/// Principal branch of the natural logarithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexLog;

impl SpecialOp for ComplexLog {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCF
    }
}

impl UnaryComputerOp<Complex64, Complex64> for ComplexLog {
    fn compute1(&self, input: &Complex64, output: &mut Complex64) -> OpResult<()> {
        *output = input.ln();
        Ok(())
    }
}

impl UnaryOutputFactory<Complex64, Complex64> for ComplexLog {
    fn create_output(&self, _input: &Complex64) -> Complex64 {
        Complex64::default()
    }
}

impl UnaryFunctionOp<Complex64, Complex64> for ComplexLog {
    fn calculate1(&self, input: &Complex64) -> OpResult<Complex64> {
        hybrid::calculate_unary(self, input)
    }
}

impl DynamicOp for ComplexLog {
    fn call(&self, inputs: &[Value]) -> OpResult<Value> {
        let z: Complex64 = typed_input(inputs, 0, DataType::Complex, Log::NAME)?;
        Ok(Value::Complex(self.calculate1(&z)?))
    }
}

pub fn register(registry: &mut OpRegistry) -> OpResult<()> {
    registry.register(
        OpInfo::builder("complex.log.default", Log::NAME)
            .op_type::<Log>()
            .input("in", DataType::Complex)
            .output(DataType::ComplexDouble)
            .description("Principal natural logarithm")
            .build(),
        Views::new(|_: &OpArgs| Ok(ComplexLog))
            .unary_hybrid_cf::<Complex64, Complex64>()
            .dynamic(),
    )
}
