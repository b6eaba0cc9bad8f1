//! Arithmetic on real pixel values.

use crate::core::error::{InstantiationResult, OpResult, OpsError};
use crate::core::img::RealPixel;
use crate::core::types::{DataType, OpFamily, Value};
use crate::matching::{OpArgs, OpEnvironment, OpInfo, OpRegistry, Views};
use crate::special::{
    hybrid, BinaryComputerOp, BinaryFunctionOp, BinaryInplace1Op, BinaryInplaceOp,
    BinaryOutputFactory, DynamicOp, SpecialOp, SpecialType, UnaryComputerOp, UnaryFunctionOp,
    UnaryInplaceOp, UnaryOutputFactory,
};

/// `math.subtract` family.
pub struct Subtract;

impl OpFamily for Subtract {
    const NAME: &'static str = "math.subtract";
}

/// `math.add` family.
pub struct Add;

impl OpFamily for Add {
    const NAME: &'static str = "math.add";
}

// ============================================================================
// Subtract Constant
// ============================================================================

/// `out = in - value`, clamped to the element type.
#[derive(Debug, Clone)]
pub struct SubtractConstant {
    value: f64,
}

impl SubtractConstant {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    pub fn from_args(args: &OpArgs) -> InstantiationResult<Self> {
        Ok(Self::new(args.param_f64("value")?))
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl SpecialOp for SubtractConstant {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCFI
    }
}

impl<T: RealPixel> UnaryComputerOp<T, T> for SubtractConstant {
    fn compute1(&self, input: &T, output: &mut T) -> OpResult<()> {
        *output = T::from_f64(input.to_f64() - self.value);
        Ok(())
    }
}

impl<T: RealPixel> UnaryOutputFactory<T, T> for SubtractConstant {
    fn create_output(&self, _input: &T) -> T {
        T::default()
    }
}

impl<T: RealPixel> UnaryFunctionOp<T, T> for SubtractConstant {
    fn calculate1(&self, input: &T) -> OpResult<T> {
        hybrid::calculate_unary(self, input)
    }
}

impl<T: RealPixel> UnaryInplaceOp<T> for SubtractConstant {
    fn mutate(&self, arg: &mut T) -> OpResult<()> {
        *arg = T::from_f64(arg.to_f64() - self.value);
        Ok(())
    }
}

impl DynamicOp for SubtractConstant {
    fn call(&self, inputs: &[Value]) -> OpResult<Value> {
        let x = real_input(inputs, 0, Subtract::NAME)?;
        Ok(Value::Double(x - self.value))
    }
}

/// Byte subtraction through a 256-entry lookup table.
///
/// The table is built in `initialize`, once per instance.
#[derive(Debug, Clone)]
pub struct SubtractConstantU8 {
    value: f64,
    table: Vec<u8>,
}

impl SubtractConstantU8 {
    pub fn from_args(args: &OpArgs) -> InstantiationResult<Self> {
        Ok(Self {
            value: args.param_f64("value")?,
            table: Vec::new(),
        })
    }

    fn lookup(&self, input: u8) -> OpResult<u8> {
        self.table
            .get(input as usize)
            .copied()
            .ok_or_else(|| OpsError::compute("math.subtract.u8", "lookup table not initialized"))
    }
}

impl SpecialOp for SubtractConstantU8 {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCFI
    }

    fn initialize(&mut self, _env: &OpEnvironment) -> OpResult<()> {
        self.table = (0..=u8::MAX)
            .map(|v| u8::from_f64(v as f64 - self.value))
            .collect();
        Ok(())
    }
}

impl UnaryComputerOp<u8, u8> for SubtractConstantU8 {
    fn compute1(&self, input: &u8, output: &mut u8) -> OpResult<()> {
        *output = self.lookup(*input)?;
        Ok(())
    }
}

impl UnaryOutputFactory<u8, u8> for SubtractConstantU8 {
    fn create_output(&self, _input: &u8) -> u8 {
        0
    }
}

impl UnaryFunctionOp<u8, u8> for SubtractConstantU8 {
    fn calculate1(&self, input: &u8) -> OpResult<u8> {
        hybrid::calculate_unary(self, input)
    }
}

impl UnaryInplaceOp<u8> for SubtractConstantU8 {
    fn mutate(&self, arg: &mut u8) -> OpResult<()> {
        *arg = self.lookup(*arg)?;
        Ok(())
    }
}

// ============================================================================
// Add
// ============================================================================

/// `out = in1 + in2`, clamped to the element type.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddValues;

fn add<T: RealPixel>(a: T, b: T) -> T {
    T::from_f64(a.to_f64() + b.to_f64())
}

impl SpecialOp for AddValues {
    fn special_type(&self) -> SpecialType {
        SpecialType::BinaryHybridCFI
    }
}

impl<T: RealPixel> BinaryComputerOp<T, T, T> for AddValues {
    fn compute2(&self, in1: &T, in2: &T, output: &mut T) -> OpResult<()> {
        *output = add(*in1, *in2);
        Ok(())
    }
}

impl<T: RealPixel> BinaryOutputFactory<T, T, T> for AddValues {
    fn create_output(&self, _in1: &T, _in2: &T) -> T {
        T::default()
    }
}

impl<T: RealPixel> BinaryFunctionOp<T, T, T> for AddValues {
    fn calculate2(&self, in1: &T, in2: &T) -> OpResult<T> {
        hybrid::calculate_binary(self, in1, in2)
    }
}

impl<T: RealPixel> BinaryInplace1Op<T, T> for AddValues {
    fn mutate1(&self, arg: &mut T, in2: &T) -> OpResult<()> {
        *arg = add(*arg, *in2);
        Ok(())
    }
}

impl<T: RealPixel> BinaryInplaceOp<T> for AddValues {
    fn mutate2(&self, in1: &T, arg: &mut T) -> OpResult<()> {
        *arg = add(*in1, *arg);
        Ok(())
    }
}

impl DynamicOp for AddValues {
    fn call(&self, inputs: &[Value]) -> OpResult<Value> {
        let a = real_input(inputs, 0, Add::NAME)?;
        let b = real_input(inputs, 1, Add::NAME)?;
        Ok(Value::Double(a + b))
    }
}

pub(crate) fn real_input(inputs: &[Value], index: usize, op: &str) -> OpResult<f64> {
    let value = inputs.get(index).ok_or_else(|| OpsError::MissingInput {
        op: op.to_string(),
        index,
    })?;
    value.as_f64().ok_or_else(|| OpsError::ArgumentType {
        index,
        expected: DataType::Real,
        got: value.data_type(),
    })
}

// ============================================================================
// Registration
// ============================================================================

pub fn register(registry: &mut OpRegistry) -> OpResult<()> {
    registry.register(
        OpInfo::builder("math.subtract.real", Subtract::NAME)
            .op_type::<Subtract>()
            .alias("subtract")
            .input("in", DataType::Real)
            .param("value", DataType::Real, None)
            .output(DataType::Real)
            .description("Subtract a constant, clamping to the element type")
            .build(),
        Views::new(SubtractConstant::from_args)
            .unary_hybrid_cfi::<u8>()
            .unary_hybrid_cfi::<i8>()
            .unary_hybrid_cfi::<u16>()
            .unary_hybrid_cfi::<i16>()
            .unary_hybrid_cfi::<i32>()
            .unary_hybrid_cfi::<i64>()
            .unary_hybrid_cfi::<f32>()
            .unary_hybrid_cfi::<f64>()
            .dynamic(),
    )?;

    registry.register(
        OpInfo::builder("math.subtract.u8", Subtract::NAME)
            .op_type::<Subtract>()
            .alias("subtract")
            .input("in", DataType::UnsignedByte)
            .param("value", DataType::Real, None)
            .output(DataType::UnsignedByte)
            .description("Subtract a constant from bytes through a lookup table")
            .build(),
        Views::new(SubtractConstantU8::from_args).unary_hybrid_cfi::<u8>(),
    )?;

    registry.register(
        OpInfo::builder("math.add.real", Add::NAME)
            .op_type::<Add>()
            .alias("add")
            .input("in1", DataType::Real)
            .input("in2", DataType::Real)
            .output(DataType::Real)
            .description("Add two values, clamping to the element type")
            .build(),
        Views::new(|_: &OpArgs| Ok(AddValues))
            .binary_hybrid_cfi::<u8>()
            .binary_hybrid_cfi::<i8>()
            .binary_hybrid_cfi::<u16>()
            .binary_hybrid_cfi::<i16>()
            .binary_hybrid_cfi::<i32>()
            .binary_hybrid_cfi::<i64>()
            .binary_hybrid_cfi::<f32>()
            .binary_hybrid_cfi::<f64>()
            .binary_hybrid_cfi1::<f64, f64>()
            .dynamic(),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::special::{BinaryHybridCFI, UnaryHybridCFI};

    fn env() -> OpEnvironment {
        OpEnvironment::with_builtins().unwrap()
    }

    #[test]
    fn test_subtract_clamps() {
        let op = SubtractConstant::new(5.0);
        let mut out = 0u8;
        op.compute1(&3u8, &mut out).unwrap();
        assert_eq!(out, 0);

        let mut x = -126i8;
        UnaryInplaceOp::<i8>::mutate(&op, &mut x).unwrap();
        assert_eq!(x, i8::MIN);

        assert_eq!(UnaryFunctionOp::<f64, f64>::calculate1(&op, &1.5).unwrap(), -3.5);
    }

    #[test]
    fn test_byte_request_prefers_lookup_table() {
        let op = env()
            .op("math.subtract")
            .arg(5.0f64)
            .unary_hybrid_cfi::<u8>()
            .unwrap();
        assert_eq!(op.id(), "math.subtract.u8");
        assert_eq!(op.calculate1(&200).unwrap(), 195);
        assert_eq!(op.calculate1(&2).unwrap(), 0);
    }

    #[test]
    fn test_float_request_uses_real_version() {
        let op = env()
            .op_type::<Subtract>()
            .arg(0.25f64)
            .unary_hybrid_cfi::<f32>()
            .unwrap();
        assert_eq!(op.id(), "math.subtract.real");

        let mut x = 1.0f32;
        op.mutate(&mut x).unwrap();
        assert_eq!(x, 0.75);
    }

    #[test]
    fn test_computer_function_inplace_agree() {
        let op: OpHandleCfi = env()
            .op("math.subtract")
            .arg(7.0f64)
            .unary_hybrid_cfi::<i16>()
            .unwrap();
        for x in [-32768i16, -5, 0, 6, 7, 100, 32767] {
            let mut computed = 0;
            op.compute1(&x, &mut computed).unwrap();
            let calculated = op.calculate1(&x).unwrap();
            let mut mutated = x;
            op.mutate(&mut mutated).unwrap();
            assert_eq!(computed, calculated);
            assert_eq!(computed, mutated);
        }
    }

    type OpHandleCfi = crate::special::OpHandle<dyn UnaryHybridCFI<i16>>;

    #[test]
    fn test_missing_value_is_no_match() {
        let err = env().op("math.subtract").unary_computer::<u8, u8>().unwrap_err();
        assert!(err.is_no_match());
        assert!(err.to_string().contains("expects 2..=2 arguments, got 1"));
    }

    #[test]
    fn test_add_hybrid() {
        let op = env().op("math.add").binary_hybrid_cfi::<u8>().unwrap();
        assert_eq!(op.calculate2(&200, &100).unwrap(), 255);

        let mut arg = 10u8;
        op.mutate1(&mut arg, &5).unwrap();
        assert_eq!(arg, 15);
        op.mutate2(&1, &mut arg).unwrap();
        assert_eq!(arg, 16);
    }

    #[test]
    fn test_add_by_alias() {
        let op: crate::special::OpHandle<dyn BinaryHybridCFI<f64>> =
            env().op("add").binary_hybrid_cfi::<f64>().unwrap();
        let mut out = 0.0;
        op.compute2(&0.5, &0.25, &mut out).unwrap();
        assert_eq!(out, 0.75);
    }

    #[test]
    fn test_dynamic_calls() {
        let env = env();
        assert_eq!(
            env.run("math.subtract", vec![Value::Double(10.0), Value::Double(2.5)])
                .unwrap(),
            Value::Double(7.5)
        );
        assert_eq!(
            env.run("math.add", vec![Value::Int(2), Value::Double(0.5)]).unwrap(),
            Value::Double(2.5)
        );
        assert!(env
            .run("math.add", vec![Value::Text("x".into()), Value::Double(0.5)])
            .is_err());
    }
}
