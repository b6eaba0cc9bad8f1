//! Local thresholding.
//!
//! Sauvola's method compares every element against a threshold derived from
//! the mean and standard deviation of its neighbourhood:
//!
//! ```text
//! threshold = mean * (1 + k * (std / r - 1))
//! ```
//!
//! The neighbourhood is the hyper-rectangle of the given radius around the
//! element, clipped to the image.

use crate::core::error::{InstantiationError, InstantiationResult, OpResult, OpsError};
use crate::core::img::{ArrayImg, Dims, RealPixel};
use crate::core::types::{DataType, OpFamily, Value};
use crate::matching::{OpArgs, OpEnvironment, OpInfo, OpRegistry, Views};
use crate::special::{
    hybrid, Concurrency, OpHandle, SpecialOp, SpecialType, UnaryComputerOp, UnaryFunctionOp,
    UnaryHybridCF, UnaryOutputFactory,
};
use log::trace;
use parking_lot::Mutex;

/// `threshold.local_sauvola` family.
pub struct LocalSauvola;

impl OpFamily for LocalSauvola {
    const NAME: &'static str = "threshold.local_sauvola";
}

type StatOp = OpHandle<dyn UnaryHybridCF<Vec<f64>, f64>>;

/// Sauvola local threshold producing a bit image.
///
/// Owns a neighbourhood buffer reused across elements, so every concurrent
/// caller needs its own instance.
pub struct LocalSauvolaThreshold {
    k: f64,
    r: f64,
    radius: usize,
    in_dims: Option<Dims>,
    out_dims: Option<Dims>,
    mean: Option<StatOp>,
    std_dev: Option<StatOp>,
    scratch: Mutex<Vec<f64>>,
}

impl LocalSauvolaThreshold {
    pub fn from_args(args: &OpArgs) -> InstantiationResult<Self> {
        let r = args.param_f64("r")?;
        if r <= 0.0 {
            return Err(InstantiationError::InvalidArgument {
                name: "r".to_string(),
                reason: format!("must be positive, got {}", r),
            });
        }
        Ok(Self {
            k: args.param_f64("k")?,
            r,
            radius: args.param_usize("radius")?,
            in_dims: args.input_dims(0),
            out_dims: args.output_dims(),
            mean: None,
            std_dev: None,
            scratch: Mutex::new(Vec::new()),
        })
    }

    fn stat_ops(&self) -> OpResult<(&StatOp, &StatOp)> {
        match (&self.mean, &self.std_dev) {
            (Some(mean), Some(std_dev)) => Ok((mean, std_dev)),
            _ => Err(OpsError::compute(
                LocalSauvola::NAME,
                "statistics ops not resolved; initialize was not run",
            )),
        }
    }

    fn threshold(&self, mean: f64, std_dev: f64) -> f64 {
        mean * (1.0 + self.k * (std_dev / self.r - 1.0))
    }
}

impl SpecialOp for LocalSauvolaThreshold {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCF
    }

    fn conforms(&self) -> bool {
        match (&self.in_dims, &self.out_dims) {
            (Some(input), Some(output)) => input == output,
            _ => true,
        }
    }

    fn initialize(&mut self, env: &OpEnvironment) -> OpResult<()> {
        self.mean = Some(env.op("stats.mean").unary_hybrid_cf::<Vec<f64>, f64>()?);
        self.std_dev = Some(env.op("stats.std_dev").unary_hybrid_cf::<Vec<f64>, f64>()?);
        trace!("{} resolved its statistics ops", LocalSauvola::NAME);
        Ok(())
    }

    fn concurrency(&self) -> Concurrency {
        Concurrency::Independent
    }
}

/// Collect the clipped neighbourhood of `center` into `out`.
fn neighbourhood<T: RealPixel>(img: &ArrayImg<T>, center: &[usize], radius: usize, out: &mut Vec<f64>) {
    out.clear();
    let dims = img.dims();
    let lo: Vec<usize> = center.iter().map(|&c| c.saturating_sub(radius)).collect();
    let hi: Vec<usize> = center
        .iter()
        .enumerate()
        .map(|(d, &c)| (c + radius).min(dims.extent(d) - 1))
        .collect();

    let mut pos = lo.clone();
    loop {
        if let Some(v) = img.get(&pos) {
            out.push(v.to_f64());
        }
        // Odometer over the window, dimension 0 fastest.
        let mut d = 0;
        loop {
            if d == pos.len() {
                return;
            }
            if pos[d] < hi[d] {
                pos[d] += 1;
                break;
            }
            pos[d] = lo[d];
            d += 1;
        }
    }
}

impl<T: RealPixel> UnaryComputerOp<ArrayImg<T>, ArrayImg<bool>> for LocalSauvolaThreshold {
    fn compute1(&self, input: &ArrayImg<T>, output: &mut ArrayImg<bool>) -> OpResult<()> {
        if input.dims() != output.dims() {
            return Err(OpsError::ShapeMismatch {
                expected: input.dims().clone(),
                got: output.dims().clone(),
            });
        }
        let (mean_op, std_op) = self.stat_ops()?;
        let mut window = self.scratch.lock();

        for (index, coords) in input.coords().enumerate() {
            neighbourhood(input, &coords, self.radius, &mut window);
            let mut mean = 0.0;
            let mut std_dev = 0.0;
            mean_op.compute1(&window, &mut mean)?;
            std_op.compute1(&window, &mut std_dev)?;

            let center = input.as_slice()[index].to_f64();
            output.as_mut_slice()[index] = center >= self.threshold(mean, std_dev);
        }
        Ok(())
    }
}

impl<T: RealPixel> UnaryOutputFactory<ArrayImg<T>, ArrayImg<bool>> for LocalSauvolaThreshold {
    fn create_output(&self, input: &ArrayImg<T>) -> ArrayImg<bool> {
        input.create_like()
    }
}

impl<T: RealPixel> UnaryFunctionOp<ArrayImg<T>, ArrayImg<bool>> for LocalSauvolaThreshold {
    fn calculate1(&self, input: &ArrayImg<T>) -> OpResult<ArrayImg<bool>> {
        hybrid::calculate_unary(self, input)
    }
}

pub fn register(registry: &mut OpRegistry) -> OpResult<()> {
    registry.register(
        OpInfo::builder("threshold.local_sauvola.default", LocalSauvola::NAME)
            .op_type::<LocalSauvola>()
            .alias("local_sauvola")
            .input("in", DataType::image(DataType::Real))
            .param("k", DataType::Real, Some(Value::Double(0.5)))
            .param("r", DataType::Real, Some(Value::Double(0.5)))
            .param("radius", DataType::Integer, Some(Value::Int(1)))
            .output(DataType::image(DataType::Bit))
            .description("Sauvola local threshold over a rectangular neighbourhood")
            .build(),
        Views::new(LocalSauvolaThreshold::from_args)
            .unary_hybrid_cf::<ArrayImg<u8>, ArrayImg<bool>>()
            .unary_hybrid_cf::<ArrayImg<u16>, ArrayImg<bool>>()
            .unary_hybrid_cf::<ArrayImg<i16>, ArrayImg<bool>>()
            .unary_hybrid_cf::<ArrayImg<i32>, ArrayImg<bool>>()
            .unary_hybrid_cf::<ArrayImg<f32>, ArrayImg<bool>>()
            .unary_hybrid_cf::<ArrayImg<f64>, ArrayImg<bool>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{MatchError, RejectReason};
    use crate::map::Mapper;

    fn env() -> OpEnvironment {
        OpEnvironment::with_builtins().unwrap()
    }

    fn spot() -> ArrayImg<f64> {
        let mut img = ArrayImg::new(Dims::new([3, 3]));
        if let Some(center) = img.get_mut(&[1, 1]) {
            *center = 1.0;
        }
        img
    }

    #[test]
    fn test_neighbourhood_is_clipped() {
        let img = ArrayImg::from_fn(Dims::new([4, 3]), |c| (c[0] + 4 * c[1]) as f64);
        let mut window = Vec::new();
        neighbourhood(&img, &[0, 0], 1, &mut window);
        assert_eq!(window, vec![0.0, 1.0, 4.0, 5.0]);

        neighbourhood(&img, &[2, 1], 1, &mut window);
        assert_eq!(window.len(), 9);
        neighbourhood(&img, &[3, 2], 2, &mut window);
        assert_eq!(window.len(), 9);
    }

    #[test]
    fn test_spot_is_foreground() {
        let op = env()
            .op("threshold.local_sauvola")
            .unary_hybrid_cf::<ArrayImg<f64>, ArrayImg<bool>>()
            .unwrap();
        let out = op.calculate1(&spot()).unwrap();

        assert_eq!(out.get(&[1, 1]), Some(&true));
        // Corner: window {0, 0, 0, 1}, mean 0.25 = threshold.
        assert_eq!(out.get(&[0, 0]), Some(&false));
        assert_eq!(out.get(&[1, 0]), Some(&false));
    }

    #[test]
    fn test_constant_image_is_foreground() {
        let op = env()
            .op("local_sauvola")
            .arg(0.3f64)
            .unary_computer::<ArrayImg<u8>, ArrayImg<bool>>()
            .unwrap();
        let input = ArrayImg::filled(Dims::new([4, 4]), 80u8);
        let mut out = input.create_like::<bool>();
        op.compute1(&input, &mut out).unwrap();
        assert!(out.iter().all(|&b| b));
    }

    #[test]
    fn test_mismatched_output_does_not_conform() {
        let input = spot();
        let output: ArrayImg<bool> = ArrayImg::new(Dims::new([4, 4]));
        let err = env()
            .op("threshold.local_sauvola")
            .input(&input)
            .output(&output)
            .unary_computer::<ArrayImg<f64>, ArrayImg<bool>>()
            .unwrap_err();
        match err {
            OpsError::Match(MatchError::NoMatch { report, .. }) => assert_eq!(
                report.reason_for("threshold.local_sauvola.default"),
                Some(&RejectReason::Conformance)
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_r_is_rejected() {
        let err = env()
            .op("threshold.local_sauvola")
            .arg(0.5f64)
            .arg(0.0f64)
            .unary_function::<ArrayImg<f64>, ArrayImg<bool>>()
            .unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn test_independent_instances_for_mapping() {
        let op = env()
            .op("threshold.local_sauvola")
            .unary_hybrid_cf::<ArrayImg<f64>, ArrayImg<bool>>()
            .unwrap();
        assert_eq!(op.concurrency(), Concurrency::Independent);

        let copy = op.independent_instance().unwrap();
        assert!(!OpHandle::ptr_eq(&op, &copy));
        assert_eq!(copy.calculate1(&spot()).unwrap(), op.calculate1(&spot()).unwrap());
    }

    #[test]
    fn test_mapper_over_images() {
        // Each element is a whole image; chunks must not share the buffer.
        let op = env()
            .op("threshold.local_sauvola")
            .unary_computer::<ArrayImg<f64>, ArrayImg<bool>>()
            .unwrap();
        let batch = ArrayImg::filled(Dims::new([6]), spot());
        let mut out = ArrayImg::filled(Dims::new([6]), ArrayImg::new(Dims::new([3, 3])));

        Mapper::threaded(3).map_unary(&op, &batch, &mut out).unwrap();
        assert!(out.iter().all(|img| img.get(&[1, 1]) == Some(&true)));
    }
}
