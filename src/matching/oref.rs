//! Operation references: immutable descriptions of a requested op.

use crate::core::types::{DataType, OpFamily, OpType, Typed, Value};
use crate::special::{Arity, SpecialType};
use std::fmt;

/// What a caller is asking for.
///
/// Built once per resolution, never mutated, and used as the matching key.
/// `args` holds typed inputs first, then parameters, in declared port order.
#[derive(Debug, Clone, PartialEq)]
pub struct OpRef {
    name: Option<String>,
    op_type: Option<OpType>,
    special_types: Vec<SpecialType>,
    output_type: Option<DataType>,
    output: Option<Value>,
    args: Vec<Value>,
}

impl OpRef {
    /// Start building a reference.
    pub fn builder() -> OpRefBuilder {
        OpRefBuilder::default()
    }

    /// Requested op name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Requested op family.
    pub fn op_type(&self) -> Option<&OpType> {
        self.op_type.as_ref()
    }

    /// Accepted shapes; empty accepts any.
    pub fn special_types(&self) -> &[SpecialType] {
        &self.special_types
    }

    /// Requested output type.
    pub fn output_type(&self) -> Option<&DataType> {
        self.output_type.as_ref()
    }

    /// Caller-supplied output descriptor.
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Positional arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Arity implied by the requested shapes.
    pub fn requested_arity(&self) -> Option<Arity> {
        self.special_types.iter().map(|t| t.arity()).max()
    }
}

impl fmt::Display for OpRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (&self.name, &self.op_type) {
            (Some(name), _) => name.as_str(),
            (None, Some(op_type)) => op_type.name(),
            (None, None) => "<any>",
        };
        let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        write!(f, "{}({})", name, args.join(", "))?;
        if let Some(output_type) = &self.output_type {
            write!(f, " -> {}", output_type)?;
        }
        if !self.special_types.is_empty() {
            let shapes: Vec<String> = self.special_types.iter().map(|t| t.to_string()).collect();
            write!(f, " as {}", shapes.join(" | "))?;
        }
        Ok(())
    }
}

/// Builder for [`OpRef`].
#[derive(Debug, Clone, Default)]
pub struct OpRefBuilder {
    name: Option<String>,
    op_type: Option<OpType>,
    special_types: Vec<SpecialType>,
    output_type: Option<DataType>,
    output: Option<Value>,
    args: Vec<Value>,
}

impl OpRefBuilder {
    /// Request by name or alias.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Request by op family.
    pub fn op_type<F: OpFamily>(mut self) -> Self {
        self.op_type = Some(OpType::of::<F>());
        self
    }

    /// Accept a shape. Several calls accept any of them.
    pub fn special_type(mut self, special_type: SpecialType) -> Self {
        if !self.special_types.contains(&special_type) {
            self.special_types.push(special_type);
        }
        self
    }

    /// Require an output type.
    pub fn output_type(mut self, data_type: DataType) -> Self {
        self.output_type = Some(data_type);
        self
    }

    /// Supply the output the op will write into.
    pub fn output<T: Typed>(mut self, output: &T) -> Self {
        self.output = Some(output.describe());
        self
    }

    /// Supply an output descriptor directly.
    pub fn output_value(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Append a typed input, described by value.
    pub fn input<T: Typed>(mut self, input: &T) -> Self {
        self.args.push(input.describe());
        self
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append several positional arguments.
    pub fn args(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(values);
        self
    }

    /// Build the reference.
    pub fn build(self) -> OpRef {
        OpRef {
            name: self.name,
            op_type: self.op_type,
            special_types: self.special_types,
            output_type: self.output_type,
            output: self.output,
            args: self.args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::img::{ArrayImg, Dims};

    #[test]
    fn test_display() {
        let img: ArrayImg<u8> = ArrayImg::new(Dims::new([10, 10]));
        let oref = OpRef::builder()
            .name("math.subtract")
            .input(&img)
            .arg(5.0f64)
            .special_type(SpecialType::UnaryComputer)
            .build();

        assert_eq!(
            oref.to_string(),
            "math.subtract(Image<UnsignedByte>[10x10], 5.0000) as UnaryComputer"
        );
        assert_eq!(oref.requested_arity(), Some(Arity::Unary));
    }

    #[test]
    fn test_output_descriptor() {
        let out: ArrayImg<f32> = ArrayImg::new(Dims::new([3]));
        let oref = OpRef::builder().name("copy.img").output(&out).build();
        assert_eq!(oref.output().and_then(|v| v.dims()), Some(&Dims::new([3])));
        assert_eq!(oref.requested_arity(), None);
    }

    struct Family;
    impl OpFamily for Family {
        const NAME: &'static str = "demo.family";
    }

    #[test]
    fn test_display_by_type() {
        let oref = OpRef::builder()
            .op_type::<Family>()
            .output_type(DataType::Double)
            .build();
        assert_eq!(oref.to_string(), "demo.family() -> Double");
    }
}
