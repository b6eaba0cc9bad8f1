//! Addressable-element containers.
//!
//! These are deliberately small: dense n-dimensional storage with dimension 0
//! varying fastest, plus a labeling built on top of an index image. Ops only
//! rely on shape queries, coordinate access, stable iteration order and
//! same-shape allocation.

use crate::core::error::{OpResult, OpsError};
use crate::core::types::{DataType, FromValue, ImageMeta, Typed, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Dims & Interval
// ============================================================================

/// Extent per dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dims(Vec<usize>);

impl Dims {
    /// Create dimensions from extents.
    pub fn new(extents: impl Into<Vec<usize>>) -> Self {
        Self(extents.into())
    }

    /// Number of dimensions.
    pub fn num_dims(&self) -> usize {
        self.0.len()
    }

    /// Extent of dimension `d`.
    pub fn extent(&self, d: usize) -> usize {
        self.0[d]
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.iter().product()
        }
    }

    /// Check if the shape holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extents as a slice.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "[{}]", parts.join("x"))
    }
}

impl From<&[usize]> for Dims {
    fn from(extents: &[usize]) -> Self {
        Self(extents.to_vec())
    }
}

/// Bounded box with inclusive min and max per dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive lower corner.
    pub min: Vec<i64>,
    /// Inclusive upper corner.
    pub max: Vec<i64>,
}

impl Interval {
    /// Create an interval from its corners.
    pub fn new(min: impl Into<Vec<i64>>, max: impl Into<Vec<i64>>) -> OpResult<Self> {
        let (min, max) = (min.into(), max.into());
        if min.len() != max.len() {
            return Err(OpsError::Other(format!(
                "interval corners differ in dimensionality: {} vs {}",
                min.len(),
                max.len()
            )));
        }
        for d in 0..min.len() {
            let extent = extent_of(min[d], max[d]);
            if extent < 0 {
                return Err(OpsError::Other(format!(
                    "interval max < min in dimension {}",
                    d
                )));
            }
            if usize::try_from(extent).is_err() {
                return Err(OpsError::Other(format!(
                    "interval extent {} out of bounds in dimension {}",
                    extent, d
                )));
            }
        }
        Ok(Self { min, max })
    }

    /// Interval starting at the origin covering `dims`.
    pub fn zero_min(dims: &Dims) -> Self {
        Self {
            min: vec![0; dims.num_dims()],
            max: dims
                .as_slice()
                .iter()
                .map(|&e| i64::try_from(e).map_or(i64::MAX, |e| e - 1))
                .collect(),
        }
    }

    /// Number of dimensions.
    pub fn num_dims(&self) -> usize {
        self.min.len()
    }

    /// Extent per dimension.
    pub fn dims(&self) -> Dims {
        Dims(
            self.min
                .iter()
                .zip(&self.max)
                .map(|(&lo, &hi)| {
                    usize::try_from(extent_of(lo, hi).max(0)).unwrap_or(usize::MAX)
                })
                .collect(),
        )
    }
}

/// Element count between inclusive bounds; wide enough for any `i64` pair.
fn extent_of(lo: i64, hi: i64) -> i128 {
    i128::from(hi) - i128::from(lo) + 1
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}..={:?}", self.min, self.max)
    }
}

impl Typed for Dims {
    fn data_type() -> DataType {
        DataType::Dimensions
    }

    fn describe(&self) -> Value {
        Value::Dims(self.clone())
    }
}

impl FromValue for Dims {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Dims(d) => Some(d.clone()),
            _ => None,
        }
    }
}

impl Typed for Interval {
    fn data_type() -> DataType {
        DataType::Interval
    }

    fn describe(&self) -> Value {
        Value::Interval(self.clone())
    }
}

impl FromValue for Interval {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Interval(i) => Some(i.clone()),
            _ => None,
        }
    }
}

// ============================================================================
// Pixel Types
// ============================================================================

/// Real-valued element types stored in images.
pub trait RealPixel:
    Copy + Default + PartialOrd + Send + Sync + Typed + fmt::Debug + 'static
{
    /// Widen to f64.
    fn to_f64(self) -> f64;

    /// Narrow from f64, rounding and clamping to the type's range.
    fn from_f64(value: f64) -> Self;
}

macro_rules! int_pixel {
    ($($ty:ty),*) => {
        $(
            impl RealPixel for $ty {
                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    if value.is_nan() {
                        return 0;
                    }
                    value.round().clamp(<$ty>::MIN as f64, <$ty>::MAX as f64) as $ty
                }
            }
        )*
    };
}

int_pixel!(u8, i8, u16, i16, i32, i64);

impl RealPixel for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl RealPixel for f64 {
    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

// ============================================================================
// ArrayImg
// ============================================================================

/// Dense n-dimensional image, dimension 0 varying fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayImg<T> {
    dims: Dims,
    data: Vec<T>,
}

impl<T: Clone> ArrayImg<T> {
    /// Create an image filled with `value`.
    pub fn filled(dims: Dims, value: T) -> Self {
        let data = vec![value; dims.len()];
        Self { dims, data }
    }
}

impl<T: Default + Clone> ArrayImg<T> {
    /// Create an image filled with the element default.
    pub fn new(dims: Dims) -> Self {
        Self::filled(dims, T::default())
    }
}

impl<T> ArrayImg<T> {
    /// Wrap existing data; `data.len()` must match `dims`.
    pub fn from_vec(dims: Dims, data: Vec<T>) -> OpResult<Self> {
        if data.len() != dims.len() {
            return Err(OpsError::Other(format!(
                "{} elements do not fill an image of shape {}",
                data.len(),
                dims
            )));
        }
        Ok(Self { dims, data })
    }

    /// Create an image from a function of the coordinates.
    pub fn from_fn(dims: Dims, mut f: impl FnMut(&[usize]) -> T) -> Self {
        let data = (0..dims.len())
            .map(|index| f(&coords_of(&dims, index)))
            .collect();
        Self { dims, data }
    }

    /// Shape of the image.
    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    /// Zero-min interval covered by the image.
    pub fn interval(&self) -> Interval {
        Interval::zero_min(&self.dims)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the image holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of a coordinate, if it lies inside the image.
    pub fn index_of(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.dims.num_dims() {
            return None;
        }
        let mut index = 0;
        let mut stride = 1;
        for (d, &c) in coords.iter().enumerate() {
            let extent = self.dims.extent(d);
            if c >= extent {
                return None;
            }
            index += c * stride;
            stride *= extent;
        }
        Some(index)
    }

    /// Coordinate of a flat index.
    pub fn coords_of(&self, index: usize) -> Vec<usize> {
        coords_of(&self.dims, index)
    }

    /// All coordinates in storage order.
    pub fn coords(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        (0..self.data.len()).map(move |index| coords_of(&self.dims, index))
    }

    /// Element at a coordinate.
    pub fn get(&self, coords: &[usize]) -> Option<&T> {
        self.index_of(coords).map(|i| &self.data[i])
    }

    /// Mutable element at a coordinate.
    pub fn get_mut(&mut self, coords: &[usize]) -> Option<&mut T> {
        self.index_of(coords).map(move |i| &mut self.data[i])
    }

    /// Allocate a new image of the same shape with another element type.
    pub fn create_like<U: Default + Clone>(&self) -> ArrayImg<U> {
        ArrayImg::new(self.dims.clone())
    }

    /// Elements in storage order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable elements in storage order.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate elements in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Consume the image, returning its elements.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

fn coords_of(dims: &Dims, mut index: usize) -> Vec<usize> {
    let mut coords = Vec::with_capacity(dims.num_dims());
    for &extent in dims.as_slice() {
        coords.push(index % extent);
        index /= extent;
    }
    coords
}

impl<T: Typed> Typed for ArrayImg<T> {
    fn data_type() -> DataType {
        DataType::image(T::data_type())
    }

    fn describe(&self) -> Value {
        Value::Image(ImageMeta {
            dims: self.dims.clone(),
            element: T::data_type(),
        })
    }
}

// ============================================================================
// Labeling
// ============================================================================

/// Table from index values to label sets.
///
/// Index 0 always maps to the empty set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelingMapping {
    sets: Vec<BTreeSet<String>>,
}

impl Default for LabelingMapping {
    fn default() -> Self {
        Self {
            sets: vec![BTreeSet::new()],
        }
    }
}

impl LabelingMapping {
    /// Create a mapping holding only the empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of a label set, adding it if unseen.
    pub fn intern(&mut self, labels: BTreeSet<String>) -> i32 {
        if let Some(pos) = self.sets.iter().position(|s| *s == labels) {
            return pos as i32;
        }
        self.sets.push(labels);
        (self.sets.len() - 1) as i32
    }

    /// Label set for an index.
    pub fn labels(&self, index: i32) -> Option<&BTreeSet<String>> {
        usize::try_from(index).ok().and_then(|i| self.sets.get(i))
    }

    /// Number of distinct label sets, including the empty one.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Always false; the empty set is always present.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Replace the contents with those of `other`.
    pub fn copy_from(&mut self, other: &LabelingMapping) {
        self.sets.clone_from(&other.sets);
    }
}

impl Typed for LabelingMapping {
    fn data_type() -> DataType {
        DataType::LabelingMapping
    }
}

/// Image of label sets, stored as an index image plus a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labeling {
    /// Index per element.
    pub indices: ArrayImg<i32>,
    /// Index to label set.
    pub mapping: LabelingMapping,
}

impl Labeling {
    /// Create an unlabeled labeling of the given shape.
    pub fn new(dims: Dims) -> Self {
        Self {
            indices: ArrayImg::new(dims),
            mapping: LabelingMapping::new(),
        }
    }

    /// Shape of the labeling.
    pub fn dims(&self) -> &Dims {
        self.indices.dims()
    }

    /// Labels at a coordinate.
    pub fn labels_at(&self, coords: &[usize]) -> Option<&BTreeSet<String>> {
        self.indices
            .get(coords)
            .and_then(|&index| self.mapping.labels(index))
    }

    /// Assign a label set at a coordinate.
    pub fn set_labels(&mut self, coords: &[usize], labels: BTreeSet<String>) -> OpResult<()> {
        let index = self.mapping.intern(labels);
        let dims = self.indices.dims().clone();
        let slot = self.indices.get_mut(coords).ok_or_else(|| {
            OpsError::Other(format!("coordinate {:?} outside {}", coords, dims))
        })?;
        *slot = index;
        Ok(())
    }
}

impl Typed for Labeling {
    fn data_type() -> DataType {
        DataType::labeling(DataType::Int)
    }

    fn describe(&self) -> Value {
        Value::Labeling(ImageMeta {
            dims: self.dims().clone(),
            element: DataType::Int,
        })
    }
}
