//! Copying of images, labeling mappings and labelings.

use crate::core::error::{InstantiationResult, OpResult, OpsError};
use crate::core::img::{ArrayImg, Dims, Labeling, LabelingMapping, RealPixel};
use crate::core::types::{DataType, OpFamily};
use crate::matching::{OpArgs, OpEnvironment, OpInfo, OpRegistry, Views};
use crate::special::{
    hybrid, OpHandle, SpecialOp, SpecialType, UnaryComputerOp, UnaryFunctionOp, UnaryHybridCF,
    UnaryOutputFactory,
};
use log::trace;

/// `copy.img` family.
pub struct CopyImg;

impl OpFamily for CopyImg {
    const NAME: &'static str = "copy.img";
}

/// `copy.labeling_mapping` family.
pub struct CopyMapping;

impl OpFamily for CopyMapping {
    const NAME: &'static str = "copy.labeling_mapping";
}

/// `copy.labeling` family.
pub struct CopyLabelingFamily;

impl OpFamily for CopyLabelingFamily {
    const NAME: &'static str = "copy.labeling";
}

fn same_shape(input: &Option<Dims>, output: &Option<Dims>) -> bool {
    match (input, output) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn check_shape(expected: &Dims, got: &Dims) -> OpResult<()> {
    if expected != got {
        return Err(OpsError::ShapeMismatch {
            expected: expected.clone(),
            got: got.clone(),
        });
    }
    Ok(())
}

// ============================================================================
// Images
// ============================================================================

/// Element-wise copy between images of equal shape.
#[derive(Debug, Clone, Default)]
pub struct CopyArrayImg {
    in_dims: Option<Dims>,
    out_dims: Option<Dims>,
}

impl CopyArrayImg {
    pub fn from_args(args: &OpArgs) -> InstantiationResult<Self> {
        Ok(Self {
            in_dims: args.input_dims(0),
            out_dims: args.output_dims(),
        })
    }
}

impl SpecialOp for CopyArrayImg {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCF
    }

    fn conforms(&self) -> bool {
        same_shape(&self.in_dims, &self.out_dims)
    }
}

impl<T: RealPixel> UnaryComputerOp<ArrayImg<T>, ArrayImg<T>> for CopyArrayImg {
    fn compute1(&self, input: &ArrayImg<T>, output: &mut ArrayImg<T>) -> OpResult<()> {
        check_shape(input.dims(), output.dims())?;
        output.as_mut_slice().copy_from_slice(input.as_slice());
        Ok(())
    }
}

impl<T: RealPixel> UnaryOutputFactory<ArrayImg<T>, ArrayImg<T>> for CopyArrayImg {
    fn create_output(&self, input: &ArrayImg<T>) -> ArrayImg<T> {
        input.create_like()
    }
}

impl<T: RealPixel> UnaryFunctionOp<ArrayImg<T>, ArrayImg<T>> for CopyArrayImg {
    fn calculate1(&self, input: &ArrayImg<T>) -> OpResult<ArrayImg<T>> {
        hybrid::calculate_unary(self, input)
    }
}

// ============================================================================
// Labelings
// ============================================================================

/// Replaces the output mapping with a copy of the input mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyLabelingMapping;

impl SpecialOp for CopyLabelingMapping {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCF
    }
}

impl UnaryComputerOp<LabelingMapping, LabelingMapping> for CopyLabelingMapping {
    fn compute1(&self, input: &LabelingMapping, output: &mut LabelingMapping) -> OpResult<()> {
        output.copy_from(input);
        Ok(())
    }
}

impl UnaryOutputFactory<LabelingMapping, LabelingMapping> for CopyLabelingMapping {
    fn create_output(&self, _input: &LabelingMapping) -> LabelingMapping {
        LabelingMapping::new()
    }
}

impl UnaryFunctionOp<LabelingMapping, LabelingMapping> for CopyLabelingMapping {
    fn calculate1(&self, input: &LabelingMapping) -> OpResult<LabelingMapping> {
        hybrid::calculate_unary(self, input)
    }
}

/// Copies a labeling by delegating to the image and mapping copy ops it
/// resolves during `initialize`.
pub struct CopyLabeling {
    in_dims: Option<Dims>,
    out_dims: Option<Dims>,
    indices: Option<OpHandle<dyn UnaryHybridCF<ArrayImg<i32>, ArrayImg<i32>>>>,
    mapping: Option<OpHandle<dyn UnaryHybridCF<LabelingMapping, LabelingMapping>>>,
}

impl CopyLabeling {
    pub fn from_args(args: &OpArgs) -> InstantiationResult<Self> {
        Ok(Self {
            in_dims: args.input_dims(0),
            out_dims: args.output_dims(),
            indices: None,
            mapping: None,
        })
    }
}

impl SpecialOp for CopyLabeling {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCF
    }

    fn conforms(&self) -> bool {
        same_shape(&self.in_dims, &self.out_dims)
    }

    fn initialize(&mut self, env: &OpEnvironment) -> OpResult<()> {
        self.indices = Some(
            env.op(CopyImg::NAME)
                .unary_hybrid_cf::<ArrayImg<i32>, ArrayImg<i32>>()?,
        );
        self.mapping = Some(
            env.op(CopyMapping::NAME)
                .unary_hybrid_cf::<LabelingMapping, LabelingMapping>()?,
        );
        trace!("{} resolved its sub-ops", CopyLabelingFamily::NAME);
        Ok(())
    }
}

impl UnaryComputerOp<Labeling, Labeling> for CopyLabeling {
    fn compute1(&self, input: &Labeling, output: &mut Labeling) -> OpResult<()> {
        let (Some(indices), Some(mapping)) = (&self.indices, &self.mapping) else {
            return Err(OpsError::compute(
                CopyLabelingFamily::NAME,
                "sub-ops not resolved; initialize was not run",
            ));
        };
        indices.compute1(&input.indices, &mut output.indices)?;
        mapping.compute1(&input.mapping, &mut output.mapping)
    }
}

impl UnaryOutputFactory<Labeling, Labeling> for CopyLabeling {
    fn create_output(&self, input: &Labeling) -> Labeling {
        Labeling::new(input.dims().clone())
    }
}

impl UnaryFunctionOp<Labeling, Labeling> for CopyLabeling {
    fn calculate1(&self, input: &Labeling) -> OpResult<Labeling> {
        hybrid::calculate_unary(self, input)
    }
}

pub fn register(registry: &mut OpRegistry) -> OpResult<()> {
    registry.register(
        OpInfo::builder("copy.img.array", CopyImg::NAME)
            .op_type::<CopyImg>()
            .input("in", DataType::image(DataType::Real))
            .output(DataType::image(DataType::Real))
            .description("Copy an image into one of the same shape")
            .build(),
        Views::new(CopyArrayImg::from_args)
            .unary_hybrid_cf::<ArrayImg<u8>, ArrayImg<u8>>()
            .unary_hybrid_cf::<ArrayImg<i8>, ArrayImg<i8>>()
            .unary_hybrid_cf::<ArrayImg<u16>, ArrayImg<u16>>()
            .unary_hybrid_cf::<ArrayImg<i16>, ArrayImg<i16>>()
            .unary_hybrid_cf::<ArrayImg<i32>, ArrayImg<i32>>()
            .unary_hybrid_cf::<ArrayImg<i64>, ArrayImg<i64>>()
            .unary_hybrid_cf::<ArrayImg<f32>, ArrayImg<f32>>()
            .unary_hybrid_cf::<ArrayImg<f64>, ArrayImg<f64>>(),
    )?;
    registry.register(
        OpInfo::builder("copy.labeling_mapping.default", CopyMapping::NAME)
            .op_type::<CopyMapping>()
            .input("in", DataType::LabelingMapping)
            .output(DataType::LabelingMapping)
            .description("Copy a labeling mapping")
            .build(),
        Views::new(|_: &OpArgs| Ok(CopyLabelingMapping))
            .unary_hybrid_cf::<LabelingMapping, LabelingMapping>(),
    )?;
    registry.register(
        OpInfo::builder("copy.labeling.default", CopyLabelingFamily::NAME)
            .op_type::<CopyLabelingFamily>()
            .input("in", DataType::labeling(DataType::Integer))
            .output(DataType::labeling(DataType::Integer))
            .description("Copy a labeling: index image and mapping")
            .build(),
        Views::new(CopyLabeling::from_args).unary_hybrid_cf::<Labeling, Labeling>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn env() -> OpEnvironment {
        OpEnvironment::with_builtins().unwrap()
    }

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_copy_img() {
        let input = ArrayImg::from_fn(Dims::new([3, 2]), |c| (c[0] * 10 + c[1]) as f32);
        let op = env()
            .op("copy.img")
            .input(&input)
            .unary_hybrid_cf::<ArrayImg<f32>, ArrayImg<f32>>()
            .unwrap();
        let copy = op.calculate1(&input).unwrap();
        assert_eq!(copy, input);

        let mut wrong: ArrayImg<f32> = ArrayImg::new(Dims::new([2, 3]));
        assert!(matches!(
            op.compute1(&input, &mut wrong),
            Err(OpsError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_copy_img_conformance() {
        let input: ArrayImg<u8> = ArrayImg::new(Dims::new([4]));
        let output: ArrayImg<u8> = ArrayImg::new(Dims::new([5]));
        let err = env()
            .op("copy.img")
            .input(&input)
            .output(&output)
            .unary_computer::<ArrayImg<u8>, ArrayImg<u8>>()
            .unwrap_err();
        assert!(err.is_no_match());
        assert!(err.to_string().contains("does not conform"));
    }

    #[test]
    fn test_copy_labeling() {
        let mut input = Labeling::new(Dims::new([3, 3]));
        input.set_labels(&[0, 0], labels(&["cell"])).unwrap();
        input.set_labels(&[2, 1], labels(&["cell", "nucleus"])).unwrap();

        let op = env()
            .op("copy.labeling")
            .input(&input)
            .unary_hybrid_cf::<Labeling, Labeling>()
            .unwrap();
        let copy = op.calculate1(&input).unwrap();

        assert_eq!(copy, input);
        assert_eq!(copy.labels_at(&[2, 1]), Some(&labels(&["cell", "nucleus"])));
        assert_eq!(copy.labels_at(&[1, 1]), Some(&BTreeSet::new()));
    }

    #[test]
    fn test_copy_labeling_into_existing_output() {
        let mut input = Labeling::new(Dims::new([2]));
        input.set_labels(&[1], labels(&["a"])).unwrap();
        let mut output = Labeling::new(Dims::new([2]));
        output.set_labels(&[0], labels(&["stale"])).unwrap();

        let op = env()
            .op("copy.labeling")
            .input(&input)
            .output(&output)
            .unary_computer::<Labeling, Labeling>()
            .unwrap();
        op.compute1(&input, &mut output).unwrap();
        assert_eq!(output, input);
    }
}
