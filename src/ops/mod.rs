//! Built-in op implementations.
//!
//! Each module registers its implementations with [`register_all`]; the
//! environment's built-in registry is exactly this set.

pub mod complex;
pub mod copy;
pub mod math;
pub mod pad;
pub mod stats;
pub mod threshold;

use crate::core::error::{OpResult, OpsError};
use crate::core::types::{DataType, FromValue, Value};
use crate::matching::OpRegistry;
use log::debug;

/// Register every built-in op.
pub fn register_all(registry: &mut OpRegistry) -> OpResult<()> {
    math::register(registry)?;
    stats::register(registry)?;
    threshold::register(registry)?;
    complex::register(registry)?;
    copy::register(registry)?;
    pad::register(registry)?;
    debug!("Registered {} built-in ops", registry.len());
    Ok(())
}

/// Positional dynamic input converted to `T`.
pub(crate) fn typed_input<T: FromValue>(
    inputs: &[Value],
    index: usize,
    expected: DataType,
    op: &str,
) -> OpResult<T> {
    let value = inputs.get(index).ok_or_else(|| OpsError::MissingInput {
        op: op.to_string(),
        index,
    })?;
    T::from_value(value).ok_or_else(|| OpsError::ArgumentType {
        index,
        expected,
        got: value.data_type(),
    })
}
