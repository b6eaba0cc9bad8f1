//! Type descriptors and argument values used for op matching.
//!
//! Matching never inspects Rust types directly. Every argument and every
//! declared port is described by a [`DataType`], and the descriptors form a
//! partial order: a port declared as [`DataType::Real`] accepts an
//! [`DataType::UnsignedByte`] argument, two generalization steps away. The
//! step count is the *distance* the matcher uses to rank how specific an
//! implementation is for a request.

use crate::core::img::{Dims, Interval};
use num_complex::Complex64;
use serde::{Deserialize, Serialize, Serializer};
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;

/// Descriptor of a value kind in the type-compatibility partial order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "inner")]
pub enum DataType {
    /// Accepts everything.
    Any,
    /// Any real or complex number.
    Numeric,
    /// Complex-valued number.
    Complex,
    /// Complex number with f64 parts.
    ComplexDouble,
    /// Any real number.
    Real,
    /// Any integral number.
    Integer,
    Bit,
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    Long,
    Float,
    Double,
    Text,
    /// Extent per dimension.
    Dimensions,
    /// Bounded box with per-dimension min and max.
    Interval,
    /// Flat sequence of elements.
    Iterable(Box<DataType>),
    /// Dense n-dimensional image of elements.
    Image(Box<DataType>),
    /// Labeling whose index image holds the given integer type.
    Labeling(Box<DataType>),
    /// Index-to-label-set table of a labeling.
    LabelingMapping,
}

impl DataType {
    /// Image of the given element type.
    pub fn image(element: DataType) -> Self {
        DataType::Image(Box::new(element))
    }

    /// Iterable of the given element type.
    pub fn iterable(element: DataType) -> Self {
        DataType::Iterable(Box::new(element))
    }

    /// Labeling with the given index type.
    pub fn labeling(index: DataType) -> Self {
        DataType::Labeling(Box::new(index))
    }

    /// Direct generalizations of this type, one step up the order.
    pub fn supertypes(&self) -> Vec<DataType> {
        use DataType::*;
        match self {
            Any => Vec::new(),
            Numeric | Text | Dimensions | LabelingMapping => vec![Any],
            Complex => vec![Numeric],
            Real | ComplexDouble => vec![Complex],
            Integer => vec![Real],
            Bit | Byte | UnsignedByte | Short | UnsignedShort | Int | Long => vec![Integer],
            Float | Double => vec![Real],
            Interval => vec![Dimensions],
            Iterable(inner) => {
                let lifted: Vec<DataType> = inner
                    .supertypes()
                    .into_iter()
                    .map(DataType::iterable)
                    .collect();
                if lifted.is_empty() {
                    vec![Any]
                } else {
                    lifted
                }
            }
            Image(inner) => {
                let mut parents = vec![Interval, DataType::iterable((**inner).clone())];
                parents.extend(inner.supertypes().into_iter().map(DataType::image));
                parents
            }
            Labeling(inner) => {
                let mut parents = vec![Interval];
                parents.extend(inner.supertypes().into_iter().map(DataType::labeling));
                parents
            }
        }
    }

    /// Number of generalization steps from `other` up to `self`.
    ///
    /// Returns `None` when a value of type `other` cannot be used where
    /// `self` is declared.
    pub fn distance_from(&self, other: &DataType) -> Option<u32> {
        if self == other {
            return Some(0);
        }

        let mut seen: HashSet<DataType> = HashSet::new();
        let mut frontier = vec![other.clone()];
        let mut depth = 0;

        while !frontier.is_empty() {
            depth += 1;
            let mut next = Vec::new();
            for current in frontier {
                for parent in current.supertypes() {
                    if &parent == self {
                        return Some(depth);
                    }
                    if seen.insert(parent.clone()) {
                        next.push(parent);
                    }
                }
            }
            frontier = next;
        }

        None
    }

    /// Check if a value of type `other` may be passed where `self` is declared.
    pub fn is_assignable_from(&self, other: &DataType) -> bool {
        self.distance_from(other).is_some()
    }

    /// Get a human-readable name for this type.
    pub fn display_name(&self) -> String {
        match self {
            DataType::Iterable(inner) => format!("Iterable<{}>", inner.display_name()),
            DataType::Image(inner) => format!("Image<{}>", inner.display_name()),
            DataType::Labeling(inner) => format!("Labeling<{}>", inner.display_name()),
            other => format!("{:?}", other),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Typed
// ============================================================================

/// Rust types that can take part in matching.
pub trait Typed {
    /// Static descriptor of the type.
    fn data_type() -> DataType;

    /// Descriptor of this particular value.
    ///
    /// Containers override this to carry their shape, which `conforms()`
    /// checks rely on.
    fn describe(&self) -> Value {
        Value::Type(Self::data_type())
    }
}

/// Conversion from a dynamic [`Value`] back into a typed argument.
pub trait FromValue: Sized {
    /// Extract `Self` from a value, if the variant fits.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! scalar_value {
    ($ty:ty, $variant:ident) => {
        impl Typed for $ty {
            fn data_type() -> DataType {
                DataType::$variant
            }

            fn describe(&self) -> Value {
                Value::$variant(self.clone())
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

scalar_value!(bool, Bit);
scalar_value!(i8, Byte);
scalar_value!(u8, UnsignedByte);
scalar_value!(i16, Short);
scalar_value!(u16, UnsignedShort);
scalar_value!(i32, Int);
scalar_value!(i64, Long);
scalar_value!(f32, Float);
scalar_value!(f64, Double);
scalar_value!(String, Text);

impl Typed for Complex64 {
    fn data_type() -> DataType {
        DataType::ComplexDouble
    }

    fn describe(&self) -> Value {
        Value::Complex(*self)
    }
}

impl From<Complex64> for Value {
    fn from(value: Complex64) -> Self {
        Value::Complex(value)
    }
}

impl FromValue for Complex64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Complex(c) => Some(*c),
            other => other.as_f64().map(|re| Complex64::new(re, 0.0)),
        }
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn data_type() -> DataType {
        DataType::iterable(T::data_type())
    }
}

// ============================================================================
// Value
// ============================================================================

/// Shape and element type of a container, without its data.
///
/// This allows matching and conformance checks without touching pixels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageMeta {
    /// Extent per dimension.
    pub dims: Dims,
    /// Element type.
    pub element: DataType,
}

/// Argument values passed to the matcher and to dynamic op calls.
///
/// A [`Value::Type`] stands for "some value of this type" when only the
/// type is known at request time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    Bit(bool),
    Byte(i8),
    UnsignedByte(u8),
    Short(i16),
    UnsignedShort(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Complex(Complex64),
    Text(String),
    Dims(Dims),
    Interval(Interval),
    /// Image described by shape and element type.
    Image(ImageMeta),
    /// Labeling described by shape and index type.
    Labeling(ImageMeta),
    /// Placeholder carrying only a type.
    Type(DataType),
    /// Absence of a value.
    None,
}

impl Value {
    /// Get the type descriptor of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bit(_) => DataType::Bit,
            Value::Byte(_) => DataType::Byte,
            Value::UnsignedByte(_) => DataType::UnsignedByte,
            Value::Short(_) => DataType::Short,
            Value::UnsignedShort(_) => DataType::UnsignedShort,
            Value::Int(_) => DataType::Int,
            Value::Long(_) => DataType::Long,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Complex(_) => DataType::ComplexDouble,
            Value::Text(_) => DataType::Text,
            Value::Dims(_) => DataType::Dimensions,
            Value::Interval(_) => DataType::Interval,
            Value::Image(meta) => DataType::image(meta.element.clone()),
            Value::Labeling(meta) => DataType::labeling(meta.element.clone()),
            Value::Type(t) => t.clone(),
            Value::None => DataType::Any,
        }
    }

    /// Try to get this value as a float.
    /// All real scalars are converted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bit(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Byte(v) => Some(*v as f64),
            Value::UnsignedByte(v) => Some(*v as f64),
            Value::Short(v) => Some(*v as f64),
            Value::UnsignedShort(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a non-negative integer.
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Byte(v) if *v >= 0 => Some(*v as usize),
            Value::UnsignedByte(v) => Some(*v as usize),
            Value::Short(v) if *v >= 0 => Some(*v as usize),
            Value::UnsignedShort(v) => Some(*v as usize),
            Value::Int(v) if *v >= 0 => Some(*v as usize),
            Value::Long(v) if *v >= 0 => Some(*v as usize),
            _ => None,
        }
    }

    /// Shape carried by this value, if it describes a container.
    pub fn dims(&self) -> Option<&Dims> {
        match self {
            Value::Dims(d) => Some(d),
            Value::Image(meta) | Value::Labeling(meta) => Some(&meta.dims),
            _ => None,
        }
    }

    /// Check if this value only carries a type.
    pub fn is_type_only(&self) -> bool {
        matches!(self, Value::Type(_) | Value::None)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bit(b) => write!(f, "{}", b),
            Value::Byte(v) => write!(f, "{}i8", v),
            Value::UnsignedByte(v) => write!(f, "{}u8", v),
            Value::Short(v) => write!(f, "{}i16", v),
            Value::UnsignedShort(v) => write!(f, "{}u16", v),
            Value::Int(v) => write!(f, "{}i32", v),
            Value::Long(v) => write!(f, "{}i64", v),
            Value::Float(v) => write!(f, "{:.4}f32", v),
            Value::Double(v) => write!(f, "{:.4}", v),
            Value::Complex(c) => write!(f, "{:.4}{:+.4}i", c.re, c.im),
            Value::Text(s) => write!(f, "\"{}\"", s),
            Value::Dims(d) => write!(f, "{}", d),
            Value::Interval(i) => write!(f, "{}", i),
            Value::Image(meta) => write!(f, "Image<{}>{}", meta.element, meta.dims),
            Value::Labeling(meta) => write!(f, "Labeling<{}>{}", meta.element, meta.dims),
            Value::Type(t) => write!(f, "{}", t),
            Value::None => write!(f, "None"),
        }
    }
}

// ============================================================================
// Op Families
// ============================================================================

/// Marker for a family of interchangeable op implementations.
///
/// Implementations of the same family compete during matching; the family
/// plays the role an interface type plays in a class-based plugin system.
pub trait OpFamily: 'static {
    /// Canonical op name, e.g. `"math.subtract"`.
    const NAME: &'static str;
}

/// Runtime identity of an [`OpFamily`].
#[derive(Debug, Clone, Copy)]
pub struct OpType {
    id: TypeId,
    name: &'static str,
}

impl OpType {
    /// Identity of the family `F`.
    pub fn of<F: OpFamily>() -> Self {
        Self {
            id: TypeId::of::<F>(),
            name: F::NAME,
        }
    }

    /// The family's canonical op name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for OpType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpType {}

impl std::hash::Hash for OpType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Serialize for OpType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_distances() {
        assert_eq!(DataType::UnsignedByte.distance_from(&DataType::UnsignedByte), Some(0));
        assert_eq!(DataType::Integer.distance_from(&DataType::UnsignedByte), Some(1));
        assert_eq!(DataType::Real.distance_from(&DataType::UnsignedByte), Some(2));
        assert_eq!(DataType::Real.distance_from(&DataType::Double), Some(1));
        assert_eq!(DataType::Complex.distance_from(&DataType::Double), Some(2));
        assert!(DataType::Any.is_assignable_from(&DataType::Text));
    }

    #[test]
    fn test_no_downcast() {
        assert!(!DataType::UnsignedByte.is_assignable_from(&DataType::Real));
        assert!(!DataType::Double.is_assignable_from(&DataType::Float));
        assert!(!DataType::Real.is_assignable_from(&DataType::ComplexDouble));
    }

    #[test]
    fn test_container_covariance() {
        let bytes = DataType::image(DataType::UnsignedByte);
        let reals = DataType::image(DataType::Real);
        assert_eq!(reals.distance_from(&bytes), Some(2));
        assert!(DataType::Interval.is_assignable_from(&bytes));
        assert!(DataType::iterable(DataType::Real).is_assignable_from(&bytes));
        assert!(!bytes.is_assignable_from(&reals));
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::from(3u8).data_type(), DataType::UnsignedByte);
        assert_eq!(Value::Double(1.0).as_f64(), Some(1.0));
        assert_eq!(Value::Int(3).as_usize(), Some(3));
        assert_eq!(Value::Int(-3).as_usize(), None);
        assert_eq!(
            Value::Type(DataType::Real).data_type(),
            DataType::Real
        );
        assert!(Value::None.is_type_only());
    }

    #[test]
    fn test_from_value() {
        assert_eq!(f64::from_value(&Value::Double(2.5)), Some(2.5));
        assert_eq!(u8::from_value(&Value::Double(2.5)), None);
        assert_eq!(
            Complex64::from_value(&Value::Double(2.0)),
            Some(Complex64::new(2.0, 0.0))
        );
    }

    struct Demo;
    impl OpFamily for Demo {
        const NAME: &'static str = "demo.op";
    }

    #[test]
    fn test_op_type_identity() {
        let a = OpType::of::<Demo>();
        let b = OpType::of::<Demo>();
        assert_eq!(a, b);
        assert_eq!(a.name(), "demo.op");
    }
}
