//! Element-wise application of bound ops across whole images.
//!
//! The mapper splits the flat element range of same-shape images into
//! contiguous chunks. Every chunk gets its own
//! [`independent_instance`](crate::special::OpHandle::independent_instance),
//! so ops owning scratch buffers never see concurrent calls. Sequential,
//! threaded and pooled runs produce identical output.

pub mod chunk;

use crate::core::config::{ExecutionMode, OpsConfig};
use crate::core::error::{OpResult, OpsError};
use crate::core::img::{ArrayImg, Dims};
use crate::special::{BinaryComputerOp, OpHandle, UnaryComputerOp, UnaryInplaceOp};
use log::{debug, trace};
use rayon::prelude::*;
use std::ops::Range;

pub use chunk::chunk_ranges;

type Job<'a> = Box<dyn FnOnce() -> OpResult<()> + Send + 'a>;

/// How a [`Mapper`] schedules its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// One traversal on the calling thread.
    Sequential,
    /// One scoped thread per chunk (0 workers = available parallelism).
    Threaded { workers: usize },
    /// Chunks on the global rayon pool.
    Pool,
}

impl Default for Execution {
    fn default() -> Self {
        Execution::Threaded { workers: 0 }
    }
}

/// Applies unary, binary and inplace ops to every element of an image.
#[derive(Debug, Clone)]
pub struct Mapper {
    execution: Execution,
    min_chunk_len: usize,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(Execution::default())
    }
}

impl Mapper {
    /// Create a mapper with the given scheduling.
    pub fn new(execution: Execution) -> Self {
        Self {
            execution,
            min_chunk_len: 1,
        }
    }

    /// Single-threaded mapper.
    pub fn sequential() -> Self {
        Self::new(Execution::Sequential)
    }

    /// Mapper using `workers` scoped threads.
    pub fn threaded(workers: usize) -> Self {
        Self::new(Execution::Threaded { workers })
    }

    /// Mapper using the rayon pool.
    pub fn pool() -> Self {
        Self::new(Execution::Pool)
    }

    /// Mapper following the configured defaults.
    pub fn from_config(config: &OpsConfig) -> Self {
        let execution = match config.execution {
            ExecutionMode::Sequential => Execution::Sequential,
            ExecutionMode::Threaded => Execution::Threaded {
                workers: config.workers,
            },
            ExecutionMode::Pool => Execution::Pool,
        };
        Self::new(execution).with_min_chunk_len(config.min_chunk_len)
    }

    /// Set the smallest chunk worth a worker.
    pub fn with_min_chunk_len(mut self, len: usize) -> Self {
        self.min_chunk_len = len.max(1);
        self
    }

    /// Scheduling in use.
    pub fn execution(&self) -> Execution {
        self.execution
    }

    /// Chunk ranges a run over `len` elements will use.
    pub fn ranges(&self, len: usize) -> Vec<Range<usize>> {
        let chunks = match self.execution {
            Execution::Sequential => 1,
            Execution::Threaded { workers: 0 } => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Execution::Threaded { workers } => workers,
            Execution::Pool => rayon::current_num_threads(),
        };
        chunk_ranges(len, chunks, self.min_chunk_len)
    }

    /// `output[c] = op(input[c])` for every coordinate `c`.
    pub fn map_unary<I, O>(
        &self,
        op: &OpHandle<dyn UnaryComputerOp<I, O>>,
        input: &ArrayImg<I>,
        output: &mut ArrayImg<O>,
    ) -> OpResult<()>
    where
        I: Sync + 'static,
        O: Send + 'static,
    {
        check_dims(input.dims(), output.dims())?;
        let ranges = self.ranges(input.len());
        let sources = chunk::split(input.as_slice(), &ranges);
        let targets = chunk::split_mut(output.as_mut_slice(), &ranges);

        let mut jobs: Vec<Job<'_>> = Vec::with_capacity(ranges.len());
        for (src, dst) in sources.into_iter().zip(targets) {
            let op = op.independent_instance()?;
            jobs.push(Box::new(move || -> OpResult<()> {
                for (i, o) in src.iter().zip(dst.iter_mut()) {
                    op.compute1(i, o)?;
                }
                Ok(())
            }));
        }
        self.run(op.id(), jobs)
    }

    /// `output[c] = op(in1[c], in2[c])` for every coordinate `c`.
    pub fn map_binary<I1, I2, O>(
        &self,
        op: &OpHandle<dyn BinaryComputerOp<I1, I2, O>>,
        in1: &ArrayImg<I1>,
        in2: &ArrayImg<I2>,
        output: &mut ArrayImg<O>,
    ) -> OpResult<()>
    where
        I1: Sync + 'static,
        I2: Sync + 'static,
        O: Send + 'static,
    {
        check_dims(in1.dims(), in2.dims())?;
        check_dims(in1.dims(), output.dims())?;
        let ranges = self.ranges(in1.len());
        let first = chunk::split(in1.as_slice(), &ranges);
        let second = chunk::split(in2.as_slice(), &ranges);
        let targets = chunk::split_mut(output.as_mut_slice(), &ranges);

        let mut jobs: Vec<Job<'_>> = Vec::with_capacity(ranges.len());
        for ((a, b), dst) in first.into_iter().zip(second).zip(targets) {
            let op = op.independent_instance()?;
            jobs.push(Box::new(move || -> OpResult<()> {
                for ((x, y), o) in a.iter().zip(b).zip(dst.iter_mut()) {
                    op.compute2(x, y, o)?;
                }
                Ok(())
            }));
        }
        self.run(op.id(), jobs)
    }

    /// `arg[c] = op(arg[c])` for every coordinate `c`.
    pub fn map_inplace<A>(&self, op: &OpHandle<dyn UnaryInplaceOp<A>>, arg: &mut ArrayImg<A>) -> OpResult<()>
    where
        A: Send + 'static,
    {
        let ranges = self.ranges(arg.len());
        let targets = chunk::split_mut(arg.as_mut_slice(), &ranges);

        let mut jobs: Vec<Job<'_>> = Vec::with_capacity(ranges.len());
        for dst in targets {
            let op = op.independent_instance()?;
            jobs.push(Box::new(move || -> OpResult<()> {
                for a in dst.iter_mut() {
                    op.mutate(a)?;
                }
                Ok(())
            }));
        }
        self.run(op.id(), jobs)
    }

    fn run(&self, op: &str, jobs: Vec<Job<'_>>) -> OpResult<()> {
        debug!("Mapping {} in {} chunks ({:?})", op, jobs.len(), self.execution);
        match self.execution {
            Execution::Sequential => {
                for job in jobs {
                    job()?;
                }
                Ok(())
            }
            Execution::Threaded { .. } => {
                let results = crossbeam::thread::scope(|scope| {
                    let handles: Vec<_> = jobs
                        .into_iter()
                        .map(|job| scope.spawn(move |_| job()))
                        .collect();
                    handles
                        .into_iter()
                        .enumerate()
                        .map(|(chunk, handle)| {
                            handle
                                .join()
                                .unwrap_or(Err(OpsError::WorkerPanicked { chunk }))
                        })
                        .collect::<Vec<_>>()
                })
                .map_err(|_| OpsError::WorkerPanicked { chunk: 0 })?;
                first_error(results)
            }
            Execution::Pool => {
                let results: Vec<OpResult<()>> = jobs.into_par_iter().map(|job| job()).collect();
                first_error(results)
            }
        }
    }
}

/// All chunks have been joined; report the lowest-index failure.
fn first_error(results: Vec<OpResult<()>>) -> OpResult<()> {
    for (chunk, result) in results.into_iter().enumerate() {
        if let Err(error) = result {
            trace!("Chunk {} failed first: {}", chunk, error);
            return Err(error);
        }
    }
    Ok(())
}

fn check_dims(expected: &Dims, got: &Dims) -> OpResult<()> {
    if expected != got {
        return Err(OpsError::ShapeMismatch {
            expected: expected.clone(),
            got: got.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{OpEnvironment, OpInfo};
    use crate::ops::math::{AddValues, SubtractConstant};
    use crate::special::{Concurrency, SpecialOp, SpecialType};
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn info(id: &str) -> Arc<OpInfo> {
        Arc::new(OpInfo::builder(id, id).build())
    }

    fn subtract(value: f64) -> OpHandle<dyn UnaryComputerOp<u8, u8>> {
        let op: Arc<dyn UnaryComputerOp<u8, u8>> = Arc::new(SubtractConstant::new(value));
        OpHandle::shared(info("math.subtract.real"), op)
    }

    fn subtract_inplace(value: f64) -> OpHandle<dyn UnaryInplaceOp<u8>> {
        let op: Arc<dyn UnaryInplaceOp<u8>> = Arc::new(SubtractConstant::new(value));
        OpHandle::shared(info("math.subtract.real"), op)
    }

    fn ramp() -> ArrayImg<u8> {
        ArrayImg::from_fn(Dims::new([10, 10]), |c| (c[0] + 10 * c[1]) as u8)
    }

    fn mappers() -> Vec<Mapper> {
        vec![
            Mapper::sequential(),
            Mapper::threaded(4),
            Mapper::threaded(0),
            Mapper::pool(),
        ]
    }

    #[test]
    fn test_subtract_five_all_variants_agree() {
        let env = OpEnvironment::with_builtins().unwrap();
        let computer = env
            .op("math.subtract")
            .arg(5.0f64)
            .unary_computer::<u8, u8>()
            .unwrap();
        let inplace = env
            .op("math.subtract")
            .arg(5.0f64)
            .unary_inplace::<u8>()
            .unwrap();
        let input = ramp();
        let expected: Vec<u8> = input.iter().map(|&v| v.saturating_sub(5)).collect();

        for mapper in mappers() {
            let mut output = input.create_like::<u8>();
            mapper.map_unary(&computer, &input, &mut output).unwrap();
            assert_eq!(output.as_slice(), expected.as_slice(), "{:?}", mapper);

            let mut arg = input.clone();
            mapper.map_inplace(&inplace, &mut arg).unwrap();
            assert_eq!(arg.as_slice(), expected.as_slice(), "{:?}", mapper);
        }
    }

    #[test]
    fn test_binary_add() {
        let op: Arc<dyn BinaryComputerOp<f64, f64, f64>> = Arc::new(AddValues);
        let op = OpHandle::shared(info("math.add.real"), op);
        let a = ArrayImg::from_fn(Dims::new([5, 3]), |c| c[0] as f64);
        let b = ArrayImg::from_fn(Dims::new([5, 3]), |c| c[1] as f64 * 0.5);

        for mapper in mappers() {
            let mut out = a.create_like::<f64>();
            mapper.map_binary(&op, &a, &b, &mut out).unwrap();
            assert_eq!(out.get(&[4, 2]), Some(&5.0));
            assert_eq!(out.get(&[0, 1]), Some(&0.5));
        }
    }

    #[test]
    fn test_shape_mismatch_before_work() {
        let input = ramp();
        let mut output: ArrayImg<u8> = ArrayImg::new(Dims::new([10, 9]));
        let err = Mapper::threaded(4)
            .map_unary(&subtract(1.0), &input, &mut output)
            .unwrap_err();
        assert!(matches!(err, OpsError::ShapeMismatch { .. }));
        assert!(output.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_empty_image() {
        let input: ArrayImg<u8> = ArrayImg::new(Dims::new([0, 4]));
        let mut output = input.create_like::<u8>();
        for mapper in mappers() {
            mapper.map_unary(&subtract(1.0), &input, &mut output).unwrap();
        }
    }

    /// Fails on any element at or above `limit`.
    struct FailAbove {
        limit: u8,
    }

    impl SpecialOp for FailAbove {
        fn special_type(&self) -> SpecialType {
            SpecialType::UnaryComputer
        }
    }

    impl UnaryComputerOp<u8, u8> for FailAbove {
        fn compute1(&self, input: &u8, output: &mut u8) -> OpResult<()> {
            if *input >= self.limit {
                return Err(OpsError::compute("test.fail_above", format!("value {}", input)));
            }
            *output = *input;
            Ok(())
        }
    }

    #[test]
    fn test_lowest_chunk_error_wins() {
        let op: Arc<dyn UnaryComputerOp<u8, u8>> = Arc::new(FailAbove { limit: 30 });
        let op = OpHandle::shared(info("test.fail_above"), op);
        let input = ramp();

        for mapper in [Mapper::sequential(), Mapper::threaded(4), Mapper::pool()] {
            let mut output = input.create_like::<u8>();
            let err = mapper.map_unary(&op, &input, &mut output).unwrap_err();
            assert!(err.to_string().contains("value 30"), "{:?}: {}", mapper, err);
        }
    }

    /// Records every value it saw; must not be shared across chunks.
    struct Recorder {
        seen: Mutex<Vec<u8>>,
    }

    impl SpecialOp for Recorder {
        fn special_type(&self) -> SpecialType {
            SpecialType::UnaryComputer
        }

        fn concurrency(&self) -> Concurrency {
            Concurrency::Independent
        }
    }

    impl UnaryComputerOp<u8, u8> for Recorder {
        fn compute1(&self, input: &u8, output: &mut u8) -> OpResult<()> {
            let mut seen = self.seen.lock();
            seen.push(*input);
            *output = seen.len() as u8;
            Ok(())
        }
    }

    #[test]
    fn test_independent_instance_per_chunk() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let op = OpHandle::from_factory(info("test.recorder"), None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let op: Arc<dyn UnaryComputerOp<u8, u8>> = Arc::new(Recorder {
                seen: Mutex::new(Vec::new()),
            });
            Ok(op)
        })
        .unwrap();

        let input = ramp();
        let mut output = input.create_like::<u8>();
        Mapper::threaded(4).map_unary(&op, &input, &mut output).unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 5);
        // Each chunk counts from 1 with its own scratch buffer.
        assert_eq!(output.as_slice()[0], 1);
        assert_eq!(output.as_slice()[25], 1);
        assert_eq!(output.as_slice()[99], 25);
    }

    #[test]
    fn test_from_config() {
        let config = OpsConfig::default()
            .with_execution(ExecutionMode::Pool)
            .with_min_chunk_len(64);
        let mapper = Mapper::from_config(&config);
        assert_eq!(mapper.execution(), Execution::Pool);
        assert_eq!(mapper.ranges(100), vec![0..100]);
    }

    proptest! {
        #[test]
        fn test_variants_equivalent(
            data in prop::collection::vec(any::<u8>(), 0..300),
            workers in 1usize..9,
            value in 0.0f64..256.0,
        ) {
            let dims = Dims::new([data.len()]);
            let input = ArrayImg::from_vec(dims, data).unwrap();
            let computer = subtract(value);

            let mut expected = input.create_like::<u8>();
            Mapper::sequential().map_unary(&computer, &input, &mut expected).unwrap();

            let mut threaded = input.create_like::<u8>();
            Mapper::threaded(workers).map_unary(&computer, &input, &mut threaded).unwrap();
            prop_assert_eq!(&threaded, &expected);

            let mut pooled = input.create_like::<u8>();
            Mapper::pool().map_unary(&computer, &input, &mut pooled).unwrap();
            prop_assert_eq!(&pooled, &expected);

            let mut arg = input.clone();
            Mapper::threaded(workers).map_inplace(&subtract_inplace(value), &mut arg).unwrap();
            prop_assert_eq!(&arg, &expected);
        }
    }
}
