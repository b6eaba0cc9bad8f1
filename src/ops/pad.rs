//! Padding helpers for filters working on enlarged domains.

use crate::core::error::{OpResult, OpsError};
use crate::core::img::{Dims, Interval};
use crate::core::types::{DataType, OpFamily, Value};
use crate::matching::{OpArgs, OpInfo, OpRegistry, Priority, Views};
use crate::ops::typed_input;
use crate::special::{BinaryFunctionOp, DynamicOp, SpecialOp, SpecialType};

/// `filter.padding_interval_centered` family.
pub struct PaddingIntervalCentered;

impl OpFamily for PaddingIntervalCentered {
    const NAME: &'static str = "filter.padding_interval_centered";
}

/// Grows an interval to the padded size, keeping the original centered.
///
/// Odd differences put the extra element after the original.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenteredPadding;

impl SpecialOp for CenteredPadding {
    fn special_type(&self) -> SpecialType {
        SpecialType::BinaryFunction
    }
}

impl BinaryFunctionOp<Interval, Dims, Interval> for CenteredPadding {
    fn calculate2(&self, input: &Interval, padded: &Dims) -> OpResult<Interval> {
        let size = input.dims();
        if size.num_dims() != padded.num_dims() {
            return Err(OpsError::ShapeMismatch {
                expected: size,
                got: padded.clone(),
            });
        }

        let mut min = Vec::with_capacity(size.num_dims());
        let mut max = Vec::with_capacity(size.num_dims());
        for d in 0..size.num_dims() {
            let (have, want) = (size.extent(d), padded.extent(d));
            if want < have {
                return Err(OpsError::compute(
                    PaddingIntervalCentered::NAME,
                    format!(
                        "padded size {} is smaller than input size {} in dimension {}",
                        want, have, d
                    ),
                ));
            }
            let (lo, hi) = padded_bounds(input.min[d], have, want).ok_or_else(|| {
                OpsError::compute(
                    PaddingIntervalCentered::NAME,
                    format!("padded bounds out of range in dimension {}", d),
                )
            })?;
            min.push(lo);
            max.push(hi);
        }
        Interval::new(min, max)
    }
}

/// Inclusive bounds of `want` elements centered on `have` starting at `min`;
/// odd slack goes to the far end.
fn padded_bounds(min: i64, have: usize, want: usize) -> Option<(i64, i64)> {
    let before = i64::try_from((want - have) / 2).ok()?;
    let lo = min.checked_sub(before)?;
    let span = i64::try_from(want).ok()?;
    let hi = lo.checked_add(span)?.checked_sub(1)?;
    Some((lo, hi))
}

impl DynamicOp for CenteredPadding {
    fn call(&self, inputs: &[Value]) -> OpResult<Value> {
        let interval: Interval = typed_input(inputs, 0, DataType::Interval, PaddingIntervalCentered::NAME)?;
        let padded: Dims = typed_input(inputs, 1, DataType::Dimensions, PaddingIntervalCentered::NAME)?;
        Ok(Value::Interval(self.calculate2(&interval, &padded)?))
    }
}

pub fn register(registry: &mut OpRegistry) -> OpResult<()> {
    registry.register(
        OpInfo::builder("filter.padding_interval_centered.default", PaddingIntervalCentered::NAME)
            .op_type::<PaddingIntervalCentered>()
            .priority(Priority::HIGH)
            .input("in", DataType::Interval)
            .input("padded", DataType::Dimensions)
            .output(DataType::Interval)
            .description("Interval of the padded size with the input centered in it")
            .build(),
        Views::new(|_: &OpArgs| Ok(CenteredPadding))
            .binary_function::<Interval, Dims, Interval>()
            .dynamic(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::OpEnvironment;

    #[test]
    fn test_even_padding() {
        let input = Interval::new(vec![0i64, 0], vec![9i64, 4]).unwrap();
        let out = CenteredPadding
            .calculate2(&input, &Dims::new([16, 5]))
            .unwrap();
        assert_eq!(out.min, vec![-3, 0]);
        assert_eq!(out.max, vec![12, 4]);
        assert_eq!(out.dims(), Dims::new([16, 5]));
    }

    #[test]
    fn test_odd_padding_extra_at_end() {
        let input = Interval::new(vec![2i64], vec![5i64]).unwrap();
        let out = CenteredPadding.calculate2(&input, &Dims::new([7])).unwrap();
        assert_eq!(out.min, vec![1]);
        assert_eq!(out.max, vec![7]);
    }

    #[test]
    fn test_smaller_padding_fails() {
        let input = Interval::new(vec![0i64], vec![9i64]).unwrap();
        let err = CenteredPadding.calculate2(&input, &Dims::new([8])).unwrap_err();
        assert!(err.to_string().contains("smaller than input"));

        let err = CenteredPadding
            .calculate2(&input, &Dims::new([10, 10]))
            .unwrap_err();
        assert!(matches!(err, OpsError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_padding_near_i64_limits() {
        let low = Interval::new(vec![i64::MIN + 1], vec![i64::MIN + 4]).unwrap();
        let err = CenteredPadding.calculate2(&low, &Dims::new([8])).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let out = CenteredPadding.calculate2(&low, &Dims::new([6])).unwrap();
        assert_eq!(out.min, vec![i64::MIN]);
        assert_eq!(out.max, vec![i64::MIN + 5]);

        let high = Interval::new(vec![i64::MAX - 3], vec![i64::MAX]).unwrap();
        let err = CenteredPadding.calculate2(&high, &Dims::new([7])).unwrap_err();
        assert!(matches!(err, OpsError::Compute { .. }));
    }

    #[test]
    fn test_resolved_and_dynamic() {
        let env = OpEnvironment::with_builtins().unwrap();
        let op = env
            .op("filter.padding_interval_centered")
            .binary_function::<Interval, Dims, Interval>()
            .unwrap();
        assert_eq!(op.info().priority, Priority::HIGH);

        let input = Interval::zero_min(&Dims::new([4]));
        let out = env
            .run(
                "filter.padding_interval_centered",
                vec![Value::Interval(input), Value::Dims(Dims::new([8]))],
            )
            .unwrap();
        assert_eq!(out, Value::Interval(Interval::new(vec![-2i64], vec![5i64]).unwrap()));
    }
}
