//! The op environment: the single entry point for finding and running ops.

use crate::core::config::OpsConfig;
use crate::core::error::OpResult;
use crate::core::types::{DataType, OpFamily, Typed, Value};
use crate::map::Mapper;
use crate::matching::{Matcher, OpRef, OpRefBuilder, OpRegistry};
use crate::special::{
    BinaryComputerOp, BinaryFunctionOp, BinaryHybridCF, BinaryHybridCFI, BinaryHybridCFI1,
    BinaryInplace1Op, BinaryInplaceOp, DynamicOp, NullaryComputerOp, NullaryFunctionOp,
    NullaryHybridCF, OpHandle, SpecialOp, SpecialType, UnaryComputerOp, UnaryFunctionOp,
    UnaryHybridCF, UnaryHybridCFI, UnaryHybridCI, UnaryInplaceOp,
};
use log::debug;
use std::sync::Arc;

/// Registry plus configuration. Cheap to clone; clones share both.
///
/// ```rust,ignore
/// let env = OpEnvironment::with_builtins()?;
/// let sub = env.op("math.subtract").arg(5.0).unary_hybrid_cfi::<u8>()?;
/// ```
#[derive(Clone)]
pub struct OpEnvironment {
    registry: Arc<OpRegistry>,
    config: Arc<OpsConfig>,
}

impl OpEnvironment {
    /// Create an environment over `registry` with the default config.
    pub fn new(registry: OpRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(OpsConfig::default()),
        }
    }

    /// Create an environment holding the built-in ops.
    pub fn with_builtins() -> OpResult<Self> {
        let registry = OpRegistry::with_builtins()?;
        debug!("Environment created with {} built-in ops", registry.len());
        Ok(Self::new(registry))
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: OpsConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// The registry.
    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    /// Mutable access to the registry.
    ///
    /// Clones the registry first if other environments still share it.
    pub fn registry_mut(&mut self) -> &mut OpRegistry {
        Arc::make_mut(&mut self.registry)
    }

    /// The configuration.
    pub fn config(&self) -> &OpsConfig {
        &self.config
    }

    /// Start a request by op name.
    pub fn op(&self, name: &str) -> OpRequest<'_> {
        OpRequest::new(self, OpRef::builder().name(name))
    }

    /// Start a request by op family.
    pub fn op_type<F: OpFamily>(&self) -> OpRequest<'_> {
        OpRequest::new(self, OpRef::builder().op_type::<F>())
    }

    /// Resolve a prepared reference to an op viewed as `V`.
    pub fn resolve<V>(&self, oref: &OpRef) -> OpResult<OpHandle<V>>
    where
        V: SpecialOp + ?Sized + 'static,
    {
        Matcher::resolve::<V>(self, oref)
    }

    /// Element-wise mapper configured from this environment.
    pub fn mapper(&self) -> Mapper {
        Mapper::from_config(&self.config)
    }

    /// Resolve `name` over dynamic values and call it.
    pub fn run(&self, name: &str, args: Vec<Value>) -> OpResult<Value> {
        let oref = OpRef::builder().name(name).args(args.iter().cloned()).build();
        let op = self.resolve::<dyn DynamicOp>(&oref)?;
        op.call(&args)
    }
}

impl std::fmt::Debug for OpEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpEnvironment")
            .field("ops", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Fluent request against an [`OpEnvironment`].
///
/// Typed inputs come first, then parameters. Terminal methods name the
/// shape and its type parameters; inputs not supplied by value are filled
/// with their type so matching still sees the full arity.
pub struct OpRequest<'env> {
    env: &'env OpEnvironment,
    builder: OpRefBuilder,
    inputs: Vec<Value>,
    params: Vec<Value>,
}

impl<'env> OpRequest<'env> {
    fn new(env: &'env OpEnvironment, builder: OpRefBuilder) -> Self {
        Self {
            env,
            builder,
            inputs: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Describe a typed input by value.
    pub fn input<T: Typed>(mut self, input: &T) -> Self {
        self.inputs.push(input.describe());
        self
    }

    /// Describe a typed input directly.
    pub fn input_value(mut self, value: Value) -> Self {
        self.inputs.push(value);
        self
    }

    /// Append a parameter.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Describe the output the op will write into.
    pub fn output<T: Typed>(mut self, output: &T) -> Self {
        self.builder = self.builder.output(output);
        self
    }

    /// Require an output type.
    pub fn output_type(mut self, data_type: DataType) -> Self {
        self.builder = self.builder.output_type(data_type);
        self
    }

    /// The reference this request would resolve, for the given shape and
    /// input types.
    pub fn oref(&self, special_type: SpecialType, input_types: &[DataType]) -> OpRef {
        let mut args = self.inputs.clone();
        for data_type in input_types.iter().skip(args.len()) {
            args.push(Value::Type(data_type.clone()));
        }
        args.extend(self.params.iter().cloned());
        self.builder
            .clone()
            .special_type(special_type)
            .args(args)
            .build()
    }

    fn resolve<V>(self, special_type: SpecialType, input_types: &[DataType]) -> OpResult<OpHandle<V>>
    where
        V: SpecialOp + ?Sized + 'static,
    {
        debug_assert_eq!(special_type.arity().count(), input_types.len());
        let oref = self.oref(special_type, input_types);
        self.env.resolve::<V>(&oref)
    }

    pub fn nullary_computer<O: 'static>(self) -> OpResult<OpHandle<dyn NullaryComputerOp<O>>> {
        self.resolve(SpecialType::NullaryComputer, &[])
    }

    pub fn nullary_function<O: 'static>(self) -> OpResult<OpHandle<dyn NullaryFunctionOp<O>>> {
        self.resolve(SpecialType::NullaryFunction, &[])
    }

    pub fn nullary_hybrid_cf<O: 'static>(self) -> OpResult<OpHandle<dyn NullaryHybridCF<O>>> {
        self.resolve(SpecialType::NullaryHybridCF, &[])
    }

    pub fn unary_computer<I: Typed + 'static, O: 'static>(
        self,
    ) -> OpResult<OpHandle<dyn UnaryComputerOp<I, O>>> {
        self.resolve(SpecialType::UnaryComputer, &[I::data_type()])
    }

    pub fn unary_function<I: Typed + 'static, O: 'static>(
        self,
    ) -> OpResult<OpHandle<dyn UnaryFunctionOp<I, O>>> {
        self.resolve(SpecialType::UnaryFunction, &[I::data_type()])
    }

    pub fn unary_inplace<A: Typed + 'static>(self) -> OpResult<OpHandle<dyn UnaryInplaceOp<A>>> {
        self.resolve(SpecialType::UnaryInplace, &[A::data_type()])
    }

    pub fn unary_hybrid_cf<I: Typed + 'static, O: 'static>(
        self,
    ) -> OpResult<OpHandle<dyn UnaryHybridCF<I, O>>> {
        self.resolve(SpecialType::UnaryHybridCF, &[I::data_type()])
    }

    pub fn unary_hybrid_ci<A: Typed + 'static>(self) -> OpResult<OpHandle<dyn UnaryHybridCI<A>>> {
        self.resolve(SpecialType::UnaryHybridCI, &[A::data_type()])
    }

    pub fn unary_hybrid_cfi<A: Typed + 'static>(self) -> OpResult<OpHandle<dyn UnaryHybridCFI<A>>> {
        self.resolve(SpecialType::UnaryHybridCFI, &[A::data_type()])
    }

    pub fn binary_computer<I1: Typed + 'static, I2: Typed + 'static, O: 'static>(
        self,
    ) -> OpResult<OpHandle<dyn BinaryComputerOp<I1, I2, O>>> {
        self.resolve(
            SpecialType::BinaryComputer,
            &[I1::data_type(), I2::data_type()],
        )
    }

    pub fn binary_function<I1: Typed + 'static, I2: Typed + 'static, O: 'static>(
        self,
    ) -> OpResult<OpHandle<dyn BinaryFunctionOp<I1, I2, O>>> {
        self.resolve(
            SpecialType::BinaryFunction,
            &[I1::data_type(), I2::data_type()],
        )
    }

    pub fn binary_inplace1<A: Typed + 'static, I: Typed + 'static>(
        self,
    ) -> OpResult<OpHandle<dyn BinaryInplace1Op<A, I>>> {
        self.resolve(
            SpecialType::BinaryInplace1,
            &[A::data_type(), I::data_type()],
        )
    }

    pub fn binary_inplace<A: Typed + 'static>(self) -> OpResult<OpHandle<dyn BinaryInplaceOp<A>>> {
        self.resolve(
            SpecialType::BinaryInplace,
            &[A::data_type(), A::data_type()],
        )
    }

    pub fn binary_hybrid_cf<I1: Typed + 'static, I2: Typed + 'static, O: 'static>(
        self,
    ) -> OpResult<OpHandle<dyn BinaryHybridCF<I1, I2, O>>> {
        self.resolve(
            SpecialType::BinaryHybridCF,
            &[I1::data_type(), I2::data_type()],
        )
    }

    pub fn binary_hybrid_cfi1<A: Typed + 'static, I: Typed + 'static>(
        self,
    ) -> OpResult<OpHandle<dyn BinaryHybridCFI1<A, I>>> {
        self.resolve(
            SpecialType::BinaryHybridCFI1,
            &[A::data_type(), I::data_type()],
        )
    }

    pub fn binary_hybrid_cfi<A: Typed + 'static>(
        self,
    ) -> OpResult<OpHandle<dyn BinaryHybridCFI<A>>> {
        self.resolve(
            SpecialType::BinaryHybridCFI,
            &[A::data_type(), A::data_type()],
        )
    }

    /// Resolve the by-name dynamic view without fixing a shape.
    pub fn dynamic(self) -> OpResult<OpHandle<dyn DynamicOp>> {
        let mut args = self.inputs;
        args.extend(self.params);
        let oref = self.builder.args(args).build();
        self.env.resolve::<dyn DynamicOp>(&oref)
    }
}
