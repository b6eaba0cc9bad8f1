//! Registry of op implementations.
//!
//! Every implementation is registered once at startup with declared
//! metadata ([`OpInfo`]) and the typed views it offers ([`Views`]). Matching
//! runs over the metadata alone; an implementation is only instantiated once
//! it has survived filtering and scoring.

use crate::core::error::{InstantiationError, InstantiationResult, OpResult, RejectReason};
use crate::core::img::Dims;
use crate::core::types::{DataType, OpFamily, OpType, Value};
use crate::matching::{OpEnvironment, OpRef};
use crate::special::{
    BinaryComputerOp, BinaryFunctionOp, BinaryHybridCF, BinaryHybridCFI, BinaryHybridCFI1,
    BinaryInplace1Op, BinaryInplaceOp, DynamicOp, NullaryComputerOp, NullaryFunctionOp,
    NullaryHybridCF, SpecialOp, SpecialType, UnaryComputerOp, UnaryFunctionOp, UnaryHybridCF,
    UnaryHybridCFI, UnaryHybridCI, UnaryInplaceOp, Arity,
};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Metadata
// ============================================================================

/// Rank among competing implementations. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Priority(pub i32);

impl Priority {
    pub const FIRST: Priority = Priority(i32::MAX);
    pub const VERY_HIGH: Priority = Priority(10_000);
    pub const HIGH: Priority = Priority(100);
    pub const NORMAL: Priority = Priority(0);
    pub const LOW: Priority = Priority(-100);
    pub const VERY_LOW: Priority = Priority(-10_000);
    pub const LAST: Priority = Priority(i32::MIN);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A declared positional port: typed input or parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortDef {
    /// Port name, used for named parameter lookup.
    pub name: String,
    /// Most general type the implementation accepts.
    pub data_type: DataType,
    /// Value used when the request leaves this port out.
    pub default: Option<Value>,
}

impl PortDef {
    /// A required port.
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: None,
        }
    }

    /// An optional port with a default.
    pub fn optional(name: impl Into<String>, data_type: DataType, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: Some(default.into()),
        }
    }

    /// Check if the request must supply this port.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Declared metadata of one implementation.
#[derive(Debug, Clone, Serialize)]
pub struct OpInfo {
    /// Unique implementation id, e.g. `"math.subtract.u8"`.
    pub id: String,
    /// Family name requests use, e.g. `"math.subtract"`.
    pub name: String,
    /// Family identity, if the implementation declares one.
    pub op_type: Option<OpType>,
    /// Extra names this implementation answers to.
    pub aliases: Vec<String>,
    /// Rank among competing implementations.
    pub priority: Priority,
    /// Shapes offered, derived from the registered views.
    pub special_types: Vec<SpecialType>,
    /// Positional ports: typed inputs first, then parameters.
    pub inputs: Vec<PortDef>,
    /// Declared output type.
    pub output: Option<DataType>,
    /// Human-readable description.
    pub description: String,
}

impl OpInfo {
    /// Create a metadata builder.
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> OpInfoBuilder {
        OpInfoBuilder::new(id, name)
    }

    /// Highest arity among the declared shapes.
    pub fn declared_arity(&self) -> Option<Arity> {
        self.special_types.iter().map(|t| t.arity()).max()
    }

    /// Number of ports a request must supply.
    pub fn required_inputs(&self) -> usize {
        self.inputs.iter().filter(|p| p.is_required()).count()
    }

    /// Check if a request name refers to this implementation.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.id == name || self.aliases.iter().any(|a| a == name)
    }
}

/// Builder for [`OpInfo`].
pub struct OpInfoBuilder {
    info: OpInfo,
}

impl OpInfoBuilder {
    /// Create a new builder with required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            info: OpInfo {
                id: id.into(),
                name: name.into(),
                op_type: None,
                aliases: Vec::new(),
                priority: Priority::NORMAL,
                special_types: Vec::new(),
                inputs: Vec::new(),
                output: None,
                description: String::new(),
            },
        }
    }

    /// Declare the op family.
    pub fn op_type<F: OpFamily>(mut self) -> Self {
        self.info.op_type = Some(OpType::of::<F>());
        self
    }

    /// Add an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.info.aliases.push(alias.into());
        self
    }

    /// Set the priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.info.priority = priority;
        self
    }

    /// Add a required typed input.
    pub fn input(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.info.inputs.push(PortDef::required(name, data_type));
        self
    }

    /// Add a parameter; `None` makes it required.
    pub fn param(mut self, name: impl Into<String>, data_type: DataType, default: Option<Value>) -> Self {
        self.info.inputs.push(PortDef {
            name: name.into(),
            data_type,
            default,
        });
        self
    }

    /// Set the declared output type.
    pub fn output(mut self, data_type: DataType) -> Self {
        self.info.output = Some(data_type);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    /// Build the metadata.
    pub fn build(self) -> OpInfo {
        self.info
    }
}

// ============================================================================
// Bound Arguments
// ============================================================================

/// Arguments handed to a factory: every declared port, in order, filled
/// from the request or from its default, plus the requested output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpArgs {
    values: IndexMap<String, Value>,
    output: Option<Value>,
}

impl OpArgs {
    /// Create empty arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Set the output descriptor.
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Value bound to a port by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Value bound to a port by position.
    pub fn input(&self, index: usize) -> Option<&Value> {
        self.values.get_index(index).map(|(_, v)| v)
    }

    /// Requested output descriptor.
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Shape of the positional input, if it describes a container.
    pub fn input_dims(&self, index: usize) -> Option<Dims> {
        self.input(index).and_then(|v| v.dims().cloned())
    }

    /// Shape of the requested output, if any.
    pub fn output_dims(&self) -> Option<Dims> {
        self.output.as_ref().and_then(|v| v.dims().cloned())
    }

    /// Numeric parameter.
    pub fn param_f64(&self, name: &str) -> InstantiationResult<f64> {
        let value = self.get(name).ok_or_else(|| InstantiationError::MissingArgument {
            name: name.to_string(),
        })?;
        value.as_f64().ok_or_else(|| InstantiationError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected a real number, got {}", value),
        })
    }

    /// Non-negative integer parameter.
    pub fn param_usize(&self, name: &str) -> InstantiationResult<usize> {
        let value = self.get(name).ok_or_else(|| InstantiationError::MissingArgument {
            name: name.to_string(),
        })?;
        value.as_usize().ok_or_else(|| InstantiationError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected a non-negative integer, got {}", value),
        })
    }
}

// ============================================================================
// Typed Views
// ============================================================================

/// Builds an initialized instance viewed as `V`, or says why it cannot.
pub type ViewFactory<V> =
    Arc<dyn Fn(&OpArgs, &OpEnvironment) -> Result<Arc<V>, RejectReason> + Send + Sync>;

type Factory<C> = Arc<dyn Fn(&OpArgs) -> InstantiationResult<C> + Send + Sync>;

/// Type-erased table of view factories, keyed by the view's `TypeId`.
#[derive(Clone, Default)]
pub struct ViewTable {
    views: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    names: Vec<&'static str>,
    special_types: Vec<SpecialType>,
}

impl ViewTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every view of `other`.
    pub fn merge(mut self, other: impl Into<ViewTable>) -> Self {
        let other = other.into();
        self.views.extend(other.views);
        for name in other.names {
            if !self.names.contains(&name) {
                self.names.push(name);
            }
        }
        for special_type in other.special_types {
            self.declare(special_type);
        }
        self
    }

    /// Factory for view `V`, if offered.
    pub fn get<V: ?Sized + 'static>(&self) -> Option<ViewFactory<V>> {
        self.views
            .get(&TypeId::of::<V>())
            .and_then(|any| any.downcast_ref::<ViewFactory<V>>())
            .cloned()
    }

    /// Check if view `V` is offered.
    pub fn offers<V: ?Sized + 'static>(&self) -> bool {
        self.views.contains_key(&TypeId::of::<V>())
    }

    /// Type names of the offered views.
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    /// Shapes declared by the offered views.
    pub fn special_types(&self) -> &[SpecialType] {
        &self.special_types
    }

    /// Number of offered views.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Check if no view is offered.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    fn insert<V: ?Sized + 'static>(&mut self, factory: ViewFactory<V>) {
        let name = std::any::type_name::<V>();
        if self.views.insert(TypeId::of::<V>(), Arc::new(factory)).is_none() {
            self.names.push(name);
        }
    }

    fn declare(&mut self, special_type: SpecialType) {
        if !self.special_types.contains(&special_type) {
            self.special_types.push(special_type);
        }
    }
}

/// Typed builder recording the views one concrete op type `C` offers.
///
/// ```rust,ignore
/// Views::new(SubtractConstant::from_args)
///     .unary_hybrid_cfi::<u8>()
///     .unary_hybrid_cfi::<f64>()
/// ```
pub struct Views<C> {
    factory: Factory<C>,
    table: ViewTable,
}

impl<C: SpecialOp + 'static> Views<C> {
    /// Start from a factory building `C` from bound arguments.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&OpArgs) -> InstantiationResult<C> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            table: ViewTable::new(),
        }
    }

    /// Offer a custom view.
    ///
    /// The generated factory instantiates `C`, checks `conforms()`, runs
    /// `initialize()`, then coerces to `V`.
    pub fn view<V: ?Sized + SpecialOp + 'static>(mut self, coerce: fn(C) -> Arc<V>) -> Self {
        let factory = self.factory.clone();
        let build: ViewFactory<V> = Arc::new(move |args: &OpArgs, env: &OpEnvironment| {
            let mut op = factory(args).map_err(RejectReason::Instantiation)?;
            if !op.conforms() {
                return Err(RejectReason::Conformance);
            }
            op.initialize(env).map_err(|e| {
                RejectReason::Instantiation(InstantiationError::Initialization(e.to_string()))
            })?;
            Ok(coerce(op))
        });
        self.table.insert(build);
        self
    }

    /// Record a declared shape without adding a view.
    pub fn declare(mut self, special_type: SpecialType) -> Self {
        self.table.declare(special_type);
        self
    }

    pub fn nullary_computer<O: 'static>(self) -> Self
    where
        C: NullaryComputerOp<O>,
    {
        self.view::<dyn NullaryComputerOp<O>>(|c| Arc::new(c))
            .declare(SpecialType::NullaryComputer)
    }

    pub fn unary_computer<I: 'static, O: 'static>(self) -> Self
    where
        C: UnaryComputerOp<I, O>,
    {
        self.view::<dyn UnaryComputerOp<I, O>>(|c| Arc::new(c))
            .declare(SpecialType::UnaryComputer)
    }

    pub fn binary_computer<I1: 'static, I2: 'static, O: 'static>(self) -> Self
    where
        C: BinaryComputerOp<I1, I2, O>,
    {
        self.view::<dyn BinaryComputerOp<I1, I2, O>>(|c| Arc::new(c))
            .declare(SpecialType::BinaryComputer)
    }

    pub fn nullary_function<O: 'static>(self) -> Self
    where
        C: NullaryFunctionOp<O>,
    {
        self.view::<dyn NullaryFunctionOp<O>>(|c| Arc::new(c))
            .declare(SpecialType::NullaryFunction)
    }

    pub fn unary_function<I: 'static, O: 'static>(self) -> Self
    where
        C: UnaryFunctionOp<I, O>,
    {
        self.view::<dyn UnaryFunctionOp<I, O>>(|c| Arc::new(c))
            .declare(SpecialType::UnaryFunction)
    }

    pub fn binary_function<I1: 'static, I2: 'static, O: 'static>(self) -> Self
    where
        C: BinaryFunctionOp<I1, I2, O>,
    {
        self.view::<dyn BinaryFunctionOp<I1, I2, O>>(|c| Arc::new(c))
            .declare(SpecialType::BinaryFunction)
    }

    pub fn unary_inplace<A: 'static>(self) -> Self
    where
        C: UnaryInplaceOp<A>,
    {
        self.view::<dyn UnaryInplaceOp<A>>(|c| Arc::new(c))
            .declare(SpecialType::UnaryInplace)
    }

    pub fn binary_inplace1<A: 'static, I: 'static>(self) -> Self
    where
        C: BinaryInplace1Op<A, I>,
    {
        self.view::<dyn BinaryInplace1Op<A, I>>(|c| Arc::new(c))
            .declare(SpecialType::BinaryInplace1)
    }

    pub fn binary_inplace<A: 'static>(self) -> Self
    where
        C: BinaryInplaceOp<A>,
    {
        self.binary_inplace1::<A, A>()
            .view::<dyn BinaryInplaceOp<A>>(|c| Arc::new(c))
            .declare(SpecialType::BinaryInplace)
    }

    pub fn nullary_hybrid_cf<O: 'static>(self) -> Self
    where
        C: NullaryHybridCF<O>,
    {
        self.nullary_computer::<O>()
            .nullary_function::<O>()
            .view::<dyn NullaryHybridCF<O>>(|c| Arc::new(c))
            .declare(SpecialType::NullaryHybridCF)
    }

    pub fn unary_hybrid_cf<I: 'static, O: 'static>(self) -> Self
    where
        C: UnaryHybridCF<I, O>,
    {
        self.unary_computer::<I, O>()
            .unary_function::<I, O>()
            .view::<dyn UnaryHybridCF<I, O>>(|c| Arc::new(c))
            .declare(SpecialType::UnaryHybridCF)
    }

    pub fn binary_hybrid_cf<I1: 'static, I2: 'static, O: 'static>(self) -> Self
    where
        C: BinaryHybridCF<I1, I2, O>,
    {
        self.binary_computer::<I1, I2, O>()
            .binary_function::<I1, I2, O>()
            .view::<dyn BinaryHybridCF<I1, I2, O>>(|c| Arc::new(c))
            .declare(SpecialType::BinaryHybridCF)
    }

    pub fn unary_hybrid_ci<A: 'static>(self) -> Self
    where
        C: UnaryHybridCI<A>,
    {
        self.unary_computer::<A, A>()
            .unary_inplace::<A>()
            .view::<dyn UnaryHybridCI<A>>(|c| Arc::new(c))
            .declare(SpecialType::UnaryHybridCI)
    }

    pub fn unary_hybrid_cfi<A: 'static>(self) -> Self
    where
        C: UnaryHybridCFI<A>,
    {
        self.unary_hybrid_cf::<A, A>()
            .unary_hybrid_ci::<A>()
            .view::<dyn UnaryHybridCFI<A>>(|c| Arc::new(c))
            .declare(SpecialType::UnaryHybridCFI)
    }

    pub fn binary_hybrid_cfi1<A: 'static, I: 'static>(self) -> Self
    where
        C: BinaryHybridCFI1<A, I>,
    {
        self.binary_hybrid_cf::<A, I, A>()
            .binary_inplace1::<A, I>()
            .view::<dyn BinaryHybridCFI1<A, I>>(|c| Arc::new(c))
            .declare(SpecialType::BinaryHybridCFI1)
    }

    pub fn binary_hybrid_cfi<A: 'static>(self) -> Self
    where
        C: BinaryHybridCFI<A>,
    {
        self.binary_hybrid_cf::<A, A, A>()
            .binary_inplace::<A>()
            .view::<dyn BinaryHybridCFI<A>>(|c| Arc::new(c))
            .declare(SpecialType::BinaryHybridCFI)
    }

    /// Offer the by-name dynamic call path.
    pub fn dynamic(self) -> Self
    where
        C: DynamicOp,
    {
        self.view::<dyn DynamicOp>(|c| Arc::new(c))
    }
}

impl<C> From<Views<C>> for ViewTable {
    fn from(views: Views<C>) -> Self {
        views.table
    }
}

// ============================================================================
// Registry
// ============================================================================

/// A registered implementation.
#[derive(Clone)]
pub struct OpEntry {
    /// Declared metadata.
    pub info: Arc<OpInfo>,
    /// Offered views.
    pub views: ViewTable,
}

/// A registered implementation considered for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Implementation id.
    pub id: String,
    /// Rank among competitors.
    pub priority: Priority,
    /// Declared metadata.
    pub info: Arc<OpInfo>,
}

impl PartialEq for OpInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// The plugin-discovery collaborator the matcher consumes.
pub trait PluginIndex {
    /// Implementations answering to the request's name or op type, in
    /// priority order (highest first, registration order among equals).
    fn find_candidates(&self, oref: &OpRef) -> Vec<Candidate>;

    /// Factory for view `V` of a registered implementation.
    fn view_factory<V: ?Sized + 'static>(&self, id: &str) -> Option<ViewFactory<V>>;

    /// Instantiate a candidate viewed as `V`.
    fn instantiate<V: ?Sized + 'static>(
        &self,
        candidate: &Candidate,
        args: &OpArgs,
        env: &OpEnvironment,
    ) -> Result<Arc<V>, RejectReason> {
        let factory = self.view_factory::<V>(&candidate.id).ok_or_else(|| {
            RejectReason::NoTypedView {
                view: std::any::type_name::<V>().to_string(),
            }
        })?;
        factory(args, env)
    }
}

/// Registry for all available op implementations.
///
/// Read-only once the environment is built; entries keep registration
/// order, which breaks ties between equal priorities.
#[derive(Clone, Default)]
pub struct OpRegistry {
    entries: IndexMap<String, OpEntry>,
}

impl OpRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in ops.
    pub fn with_builtins() -> OpResult<Self> {
        let mut registry = Self::new();
        crate::ops::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Register an implementation.
    ///
    /// The declared shapes are taken from the views. Re-registering an id
    /// replaces the previous entry.
    pub fn register(&mut self, info: OpInfo, views: impl Into<ViewTable>) -> OpResult<()> {
        let views = views.into();
        let mut info = info;

        if views.is_empty() {
            return Err(crate::core::error::OpsError::Other(format!(
                "op '{}' registers no views",
                info.id
            )));
        }

        info.special_types = views.special_types().to_vec();
        let id = info.id.clone();
        debug!(
            "Registering {} as '{}' ({} views, priority {})",
            id,
            info.name,
            views.len(),
            info.priority
        );

        let entry = OpEntry {
            info: Arc::new(info),
            views,
        };
        if self.entries.insert(id.clone(), entry).is_some() {
            warn!("Op '{}' was registered twice; keeping the latest", id);
        }
        Ok(())
    }

    /// Unregister an implementation.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.entries.shift_remove(id).is_some()
    }

    /// Check if an implementation is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Get a registry entry.
    pub fn get(&self, id: &str) -> Option<&OpEntry> {
        self.entries.get(id)
    }

    /// Get all registered entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OpEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Distinct family names in registration order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in self.entries.values() {
            if !names.contains(&entry.info.name.as_str()) {
                names.push(&entry.info.name);
            }
        }
        names
    }

    /// Get the total number of registered implementations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PluginIndex for OpRegistry {
    fn find_candidates(&self, oref: &OpRef) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .entries
            .values()
            .filter(|entry| {
                let by_name = oref.name().map_or(true, |name| entry.info.answers_to(name));
                let by_type = oref
                    .op_type()
                    .map_or(true, |t| entry.info.op_type.as_ref() == Some(t));
                by_name && by_type
            })
            .map(|entry| Candidate {
                id: entry.info.id.clone(),
                priority: entry.info.priority,
                info: entry.info.clone(),
            })
            .collect();

        // Stable: registration order survives among equal priorities.
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        candidates
    }

    fn view_factory<V: ?Sized + 'static>(&self, id: &str) -> Option<ViewFactory<V>> {
        self.entries.get(id).and_then(|entry| entry.views.get::<V>())
    }
}

impl fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpRegistry")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
