//! Descriptive statistics over collections of reals.

use crate::core::error::{OpResult, OpsError};
use crate::core::types::{DataType, OpFamily};
use crate::matching::{OpArgs, OpInfo, OpRegistry, Views};
use crate::special::{
    hybrid, SpecialOp, SpecialType, UnaryComputerOp, UnaryFunctionOp, UnaryOutputFactory,
};

/// `stats.mean` family.
pub struct Mean;

impl OpFamily for Mean {
    const NAME: &'static str = "stats.mean";
}

/// `stats.std_dev` family.
pub struct StdDev;

impl OpFamily for StdDev {
    const NAME: &'static str = "stats.std_dev";
}

/// Arithmetic mean. Empty input is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanOp;

impl SpecialOp for MeanOp {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCF
    }
}

impl UnaryComputerOp<Vec<f64>, f64> for MeanOp {
    fn compute1(&self, input: &Vec<f64>, output: &mut f64) -> OpResult<()> {
        if input.is_empty() {
            return Err(OpsError::compute(Mean::NAME, "mean of an empty collection"));
        }
        *output = input.iter().sum::<f64>() / input.len() as f64;
        Ok(())
    }
}

impl UnaryOutputFactory<Vec<f64>, f64> for MeanOp {
    fn create_output(&self, _input: &Vec<f64>) -> f64 {
        0.0
    }
}

impl UnaryFunctionOp<Vec<f64>, f64> for MeanOp {
    fn calculate1(&self, input: &Vec<f64>) -> OpResult<f64> {
        hybrid::calculate_unary(self, input)
    }
}

/// Sample standard deviation (n - 1 denominator); 0 for fewer than two values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDevOp;

impl SpecialOp for StdDevOp {
    fn special_type(&self) -> SpecialType {
        SpecialType::UnaryHybridCF
    }
}

impl UnaryComputerOp<Vec<f64>, f64> for StdDevOp {
    fn compute1(&self, input: &Vec<f64>, output: &mut f64) -> OpResult<()> {
        let n = input.len();
        if n < 2 {
            *output = 0.0;
            return Ok(());
        }
        let mean = input.iter().sum::<f64>() / n as f64;
        let squares: f64 = input.iter().map(|v| (v - mean) * (v - mean)).sum();
        *output = (squares / (n - 1) as f64).sqrt();
        Ok(())
    }
}

impl UnaryOutputFactory<Vec<f64>, f64> for StdDevOp {
    fn create_output(&self, _input: &Vec<f64>) -> f64 {
        0.0
    }
}

impl UnaryFunctionOp<Vec<f64>, f64> for StdDevOp {
    fn calculate1(&self, input: &Vec<f64>) -> OpResult<f64> {
        hybrid::calculate_unary(self, input)
    }
}

pub fn register(registry: &mut OpRegistry) -> OpResult<()> {
    registry.register(
        OpInfo::builder("stats.mean.default", Mean::NAME)
            .op_type::<Mean>()
            .alias("mean")
            .input("in", DataType::iterable(DataType::Double))
            .output(DataType::Double)
            .description("Arithmetic mean")
            .build(),
        Views::new(|_: &OpArgs| Ok(MeanOp)).unary_hybrid_cf::<Vec<f64>, f64>(),
    )?;
    registry.register(
        OpInfo::builder("stats.std_dev.default", StdDev::NAME)
            .op_type::<StdDev>()
            .alias("std_dev")
            .input("in", DataType::iterable(DataType::Double))
            .output(DataType::Double)
            .description("Sample standard deviation")
            .build(),
        Views::new(|_: &OpArgs| Ok(StdDevOp)).unary_hybrid_cf::<Vec<f64>, f64>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::OpEnvironment;

    #[test]
    fn test_mean() {
        assert_eq!(MeanOp.calculate1(&vec![1.0, 2.0, 6.0]).unwrap(), 3.0);
        assert!(MeanOp.calculate1(&Vec::new()).is_err());
    }

    #[test]
    fn test_std_dev_is_sample() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = StdDevOp.calculate1(&values).unwrap();
        assert!((std - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(StdDevOp.calculate1(&vec![3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_resolved_by_family() {
        let env = OpEnvironment::with_builtins().unwrap();
        let mean = env
            .op_type::<Mean>()
            .unary_hybrid_cf::<Vec<f64>, f64>()
            .unwrap();
        let mut out = 0.0;
        mean.compute1(&vec![0.5, 1.5], &mut out).unwrap();
        assert_eq!(out, 1.0);

        let std = env.op("std_dev").unary_function::<Vec<f64>, f64>().unwrap();
        assert_eq!(std.calculate1(&vec![1.0, 3.0]).unwrap(), 2.0f64.sqrt());
    }
}
