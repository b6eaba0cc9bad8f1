//! Resolution of a request to exactly one initialized op.
//!
//! Candidates that survive filtering are scored by `(priority, specificity)`.
//! Specificity is the negated sum of type distances between the request's
//! arguments and the declared ports: an implementation declared for
//! `UnsignedByte` beats one declared for `Real` on a byte argument.
//!
//! Score levels are tried best first. Within a level every candidate is
//! instantiated, checked with `conforms()` and initialized. A level with no
//! survivors falls through to the next; a level with several survivors is
//! ambiguous.

use crate::core::error::{
    InstantiationError, MatchError, MatchReport, OpResult, OpsError, RejectReason,
};
use crate::matching::query::query_with_report;
use crate::matching::registry::{Candidate, OpArgs, OpInfo, PluginIndex, Priority};
use crate::matching::{OpEnvironment, OpRef};
use crate::special::{OpHandle, SpecialOp};
use log::{debug, trace};
use std::sync::Arc;

/// Candidate rank; compared lexicographically, higher wins.
pub type Score = (Priority, i64);

struct Scored {
    candidate: Candidate,
    args: OpArgs,
    score: Score,
}

/// Resolves op references against an environment's registry.
pub struct Matcher;

impl Matcher {
    /// Resolve `oref` to one op viewed as `V`.
    pub fn resolve<V>(env: &OpEnvironment, oref: &OpRef) -> OpResult<OpHandle<V>>
    where
        V: SpecialOp + ?Sized + 'static,
    {
        let registry = env.registry();
        let (candidates, mut report) = query_with_report(registry, oref, oref.requested_arity());

        let mut scored: Vec<Scored> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if registry.view_factory::<V>(&candidate.id).is_none() {
                report.reject(
                    &candidate.id,
                    RejectReason::NoTypedView {
                        view: std::any::type_name::<V>().to_string(),
                    },
                );
                continue;
            }
            match bind(&candidate.info, oref) {
                Ok((args, specificity)) => {
                    let score = (candidate.priority, specificity);
                    trace!("{} scores {:?} for {}", candidate.id, score, oref);
                    scored.push(Scored {
                        candidate,
                        args,
                        score,
                    });
                }
                Err(reason) => report.reject(&candidate.id, reason),
            }
        }

        // Stable: registration order survives inside a level.
        scored.sort_by(|a, b| b.score.cmp(&a.score));

        let mut start = 0;
        while start < scored.len() {
            let level = scored[start].score;
            let end = scored[start..]
                .iter()
                .position(|s| s.score != level)
                .map_or(scored.len(), |offset| start + offset);

            let mut survivors = Vec::new();
            for entry in &scored[start..end] {
                match registry.instantiate::<V>(&entry.candidate, &entry.args, env) {
                    Ok(op) => survivors.push((entry, op)),
                    Err(reason) => {
                        if env.config().log_rejections {
                            debug!("Dropping {} for {}: {}", entry.candidate.id, oref, reason);
                        }
                        report.reject(&entry.candidate.id, reason);
                    }
                }
            }

            match survivors.len() {
                0 => start = end,
                1 => {
                    let (entry, op) = survivors.remove(0);
                    debug!("Resolved {} to {}", oref, entry.candidate.id);
                    return Ok(handle(env, entry, op));
                }
                _ => {
                    return Err(MatchError::Ambiguous {
                        request: oref.to_string(),
                        candidates: survivors
                            .iter()
                            .map(|(entry, _)| entry.candidate.id.clone())
                            .collect(),
                    }
                    .into());
                }
            }
        }

        Err(no_match(oref, report))
    }

    /// Check if `oref` resolves to some op viewed as `V`.
    pub fn matches<V>(env: &OpEnvironment, oref: &OpRef) -> bool
    where
        V: SpecialOp + ?Sized + 'static,
    {
        Self::resolve::<V>(env, oref).is_ok()
    }
}

fn no_match(oref: &OpRef, report: MatchReport) -> OpsError {
    MatchError::NoMatch {
        request: oref.to_string(),
        report,
    }
    .into()
}

fn handle<V>(env: &OpEnvironment, entry: &Scored, op: Arc<V>) -> OpHandle<V>
where
    V: SpecialOp + ?Sized + 'static,
{
    let candidate = entry.candidate.clone();
    let args = entry.args.clone();
    let replica_env = env.clone();
    let replicate = move || {
        replica_env
            .registry()
            .instantiate::<V>(&candidate, &args, &replica_env)
            .map_err(|reason| replication_error(&candidate.id, reason))
    };
    OpHandle::new(op, entry.candidate.info.clone(), Some(env.clone()), replicate)
}

fn replication_error(id: &str, reason: RejectReason) -> OpsError {
    match reason {
        RejectReason::Instantiation(error) => OpsError::Instantiation(error),
        other => OpsError::Instantiation(InstantiationError::Unsupported(format!(
            "replica of '{}' rejected: {}",
            id, other
        ))),
    }
}

/// Bind the request's arguments to the declared ports.
///
/// Returns the bound arguments and the specificity of the binding.
fn bind(info: &OpInfo, oref: &OpRef) -> Result<(OpArgs, i64), RejectReason> {
    let args = oref.args();
    let min = info.required_inputs();
    let max = info.inputs.len();
    if args.len() < min || args.len() > max {
        return Err(RejectReason::ArgumentCount {
            min,
            max,
            got: args.len(),
        });
    }

    let mut distance: u32 = 0;
    let mut bound = OpArgs::new();
    for (index, port) in info.inputs.iter().enumerate() {
        match args.get(index) {
            Some(arg) => {
                let got = arg.data_type();
                let step = port.data_type.distance_from(&got).ok_or_else(|| {
                    RejectReason::ArgumentType {
                        index,
                        expected: port.data_type.clone(),
                        got,
                    }
                })?;
                distance += step;
                bound = bound.with(port.name.clone(), arg.clone());
            }
            None => {
                // Only ports with defaults can be missing past `min`.
                let default = port.default.clone().ok_or(RejectReason::ArgumentCount {
                    min,
                    max,
                    got: args.len(),
                })?;
                bound = bound.with(port.name.clone(), default);
            }
        }
    }

    if let Some(output) = oref.output() {
        let got = output.data_type();
        if let Some(declared) = &info.output {
            let step = declared.distance_from(&got).ok_or_else(|| RejectReason::OutputType {
                declared: declared.clone(),
                requested: got.clone(),
            })?;
            distance += step;
        }
        bound = bound.with_output(output.clone());
    }

    if let (Some(requested), Some(declared)) = (oref.output_type(), &info.output) {
        distance += requested.distance_from(declared).unwrap_or(0);
    }

    Ok((bound, -(distance as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::OpResult;
    use crate::core::img::{ArrayImg, Dims};
    use crate::core::types::{DataType, Value};
    use crate::matching::registry::{OpRegistry, Views};
    use crate::special::{SpecialType, UnaryComputerOp};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a fixed tag so tests can tell implementations apart.
    struct Tag {
        tag: u8,
        accept: bool,
    }

    impl SpecialOp for Tag {
        fn special_type(&self) -> SpecialType {
            SpecialType::UnaryComputer
        }

        fn conforms(&self) -> bool {
            self.accept
        }
    }

    impl UnaryComputerOp<u8, u8> for Tag {
        fn compute1(&self, _input: &u8, output: &mut u8) -> OpResult<()> {
            *output = self.tag;
            Ok(())
        }
    }

    fn register_tag(
        registry: &mut OpRegistry,
        id: &str,
        declared: DataType,
        priority: Priority,
        tag: u8,
        accept: bool,
    ) {
        registry
            .register(
                OpInfo::builder(id, "test.tag")
                    .priority(priority)
                    .input("in", declared)
                    .output(DataType::UnsignedByte)
                    .build(),
                Views::new(move |_: &OpArgs| Ok(Tag { tag, accept })).unary_computer::<u8, u8>(),
            )
            .unwrap();
    }

    fn request() -> OpRef {
        OpRef::builder()
            .name("test.tag")
            .arg(Value::Type(DataType::UnsignedByte))
            .special_type(SpecialType::UnaryComputer)
            .build()
    }

    fn tag_of(env: &OpEnvironment) -> OpResult<u8> {
        let op = Matcher::resolve::<dyn UnaryComputerOp<u8, u8>>(env, &request())?;
        let mut out = 0;
        op.compute1(&0, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_priority_wins() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "low", DataType::UnsignedByte, Priority::LOW, 1, true);
        register_tag(&mut registry, "high", DataType::Real, Priority::HIGH, 2, true);
        let env = OpEnvironment::new(registry);
        assert_eq!(tag_of(&env).unwrap(), 2);
    }

    #[test]
    fn test_specificity_wins_on_equal_priority() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "general", DataType::Real, Priority::NORMAL, 1, true);
        register_tag(&mut registry, "exact", DataType::UnsignedByte, Priority::NORMAL, 2, true);
        register_tag(&mut registry, "integer", DataType::Integer, Priority::NORMAL, 3, true);
        let env = OpEnvironment::new(registry);
        assert_eq!(tag_of(&env).unwrap(), 2);
    }

    #[test]
    fn test_ambiguous_then_resolved_after_unregister() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "first", DataType::Integer, Priority::NORMAL, 1, true);
        register_tag(&mut registry, "second", DataType::Integer, Priority::NORMAL, 2, true);
        let mut env = OpEnvironment::new(registry);

        let err = tag_of(&env).unwrap_err();
        assert!(err.is_ambiguous());
        match err {
            OpsError::Match(e) => assert_eq!(e.candidates(), vec!["first", "second"]),
            other => panic!("unexpected {:?}", other),
        }

        env.registry_mut().unregister("first");
        assert_eq!(tag_of(&env).unwrap(), 2);
    }

    #[test]
    fn test_nonconforming_only_candidate_is_no_match() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "picky", DataType::UnsignedByte, Priority::NORMAL, 1, false);
        let env = OpEnvironment::new(registry);

        let err = tag_of(&env).unwrap_err();
        assert!(err.is_no_match());
        match err {
            OpsError::Match(MatchError::NoMatch { report, .. }) => {
                assert_eq!(report.reason_for("picky"), Some(&RejectReason::Conformance));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nonconforming_falls_through_to_next_level() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "exact", DataType::UnsignedByte, Priority::NORMAL, 1, false);
        register_tag(&mut registry, "general", DataType::Real, Priority::NORMAL, 2, true);
        let env = OpEnvironment::new(registry);
        assert_eq!(tag_of(&env).unwrap(), 2);
    }

    #[test]
    fn test_nonconforming_breaks_tie() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "a", DataType::Integer, Priority::NORMAL, 1, false);
        register_tag(&mut registry, "b", DataType::Integer, Priority::NORMAL, 2, true);
        let env = OpEnvironment::new(registry);
        assert_eq!(tag_of(&env).unwrap(), 2);
    }

    #[test]
    fn test_failing_factory_is_excluded() {
        let mut registry = OpRegistry::new();
        registry
            .register(
                OpInfo::builder("broken", "test.tag")
                    .priority(Priority::HIGH)
                    .input("in", DataType::UnsignedByte)
                    .build(),
                Views::new(|_: &OpArgs| -> crate::core::InstantiationResult<Tag> {
                    Err(InstantiationError::Unsupported("no backend".to_string()))
                })
                .unary_computer::<u8, u8>(),
            )
            .unwrap();
        register_tag(&mut registry, "working", DataType::Real, Priority::LOW, 7, true);
        let env = OpEnvironment::new(registry);
        assert_eq!(tag_of(&env).unwrap(), 7);
    }

    #[test]
    fn test_no_candidates() {
        let env = OpEnvironment::new(OpRegistry::new());
        let err = tag_of(&env).unwrap_err();
        assert!(err.is_no_match());
        assert!(err.to_string().contains("test.tag"));
        assert!(err.to_string().contains("no candidates registered"));
    }

    #[test]
    fn test_missing_view_reported() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "bytes", DataType::UnsignedByte, Priority::NORMAL, 1, true);
        let env = OpEnvironment::new(registry);

        let err = Matcher::resolve::<dyn UnaryComputerOp<f32, f32>>(&env, &request()).unwrap_err();
        match err {
            OpsError::Match(MatchError::NoMatch { report, .. }) => {
                assert!(matches!(
                    report.reason_for("bytes"),
                    Some(RejectReason::NoTypedView { .. })
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_argument_type_mismatch() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "bytes", DataType::UnsignedByte, Priority::NORMAL, 1, true);
        let env = OpEnvironment::new(registry);

        let oref = OpRef::builder()
            .name("test.tag")
            .arg(Value::Double(1.0))
            .special_type(SpecialType::UnaryComputer)
            .build();
        let err = Matcher::resolve::<dyn UnaryComputerOp<u8, u8>>(&env, &oref).unwrap_err();
        assert!(err.to_string().contains("argument 0 expects UnsignedByte, got Double"));
    }

    #[test]
    fn test_initialize_runs_once_per_instance() {
        static INITIALIZED: AtomicUsize = AtomicUsize::new(0);

        struct Counted;
        impl SpecialOp for Counted {
            fn special_type(&self) -> SpecialType {
                SpecialType::UnaryComputer
            }

            fn initialize(&mut self, _env: &OpEnvironment) -> OpResult<()> {
                INITIALIZED.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
        impl UnaryComputerOp<ArrayImg<u8>, ArrayImg<u8>> for Counted {
            fn compute1(&self, input: &ArrayImg<u8>, output: &mut ArrayImg<u8>) -> OpResult<()> {
                output.as_mut_slice().copy_from_slice(input.as_slice());
                Ok(())
            }
        }

        let mut registry = OpRegistry::new();
        registry
            .register(
                OpInfo::builder("counted", "test.counted")
                    .input("in", DataType::image(DataType::Any))
                    .build(),
                Views::new(|_: &OpArgs| Ok(Counted)).unary_computer::<ArrayImg<u8>, ArrayImg<u8>>(),
            )
            .unwrap();
        let env = OpEnvironment::new(registry);
        let img: ArrayImg<u8> = ArrayImg::new(Dims::new([2]));
        let oref = OpRef::builder().name("test.counted").input(&img).build();

        let op = Matcher::resolve::<dyn UnaryComputerOp<ArrayImg<u8>, ArrayImg<u8>>>(&env, &oref)
            .unwrap();
        let mut out = img.clone();
        op.compute1(&img, &mut out).unwrap();
        op.compute1(&img, &mut out).unwrap();
        assert_eq!(INITIALIZED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_matches_tracks_resolvability() {
        let mut registry = OpRegistry::new();
        register_tag(&mut registry, "first", DataType::Integer, Priority::NORMAL, 1, true);
        let mut env = OpEnvironment::new(registry);

        assert!(Matcher::matches::<dyn UnaryComputerOp<u8, u8>>(&env, &request()));
        assert!(!Matcher::matches::<dyn UnaryComputerOp<f32, f32>>(&env, &request()));

        register_tag(env.registry_mut(), "second", DataType::Integer, Priority::NORMAL, 2, true);
        assert!(!Matcher::matches::<dyn UnaryComputerOp<u8, u8>>(&env, &request()));
    }

    #[test]
    fn test_replica_is_reinstantiated_through_registry() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        struct Scratch;
        impl SpecialOp for Scratch {
            fn special_type(&self) -> SpecialType {
                SpecialType::UnaryComputer
            }

            fn concurrency(&self) -> crate::special::Concurrency {
                crate::special::Concurrency::Independent
            }
        }
        impl UnaryComputerOp<u8, u8> for Scratch {
            fn compute1(&self, input: &u8, output: &mut u8) -> OpResult<()> {
                *output = input + 1;
                Ok(())
            }
        }

        let mut registry = OpRegistry::new();
        registry
            .register(
                OpInfo::builder("scratch", "test.tag")
                    .input("in", DataType::UnsignedByte)
                    .build(),
                Views::new(|_: &OpArgs| {
                    BUILT.fetch_add(1, Ordering::SeqCst);
                    Ok(Scratch)
                })
                .unary_computer::<u8, u8>(),
            )
            .unwrap();
        let env = OpEnvironment::new(registry);

        let op = Matcher::resolve::<dyn UnaryComputerOp<u8, u8>>(&env, &request()).unwrap();
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);

        let replica = op.independent_instance().unwrap();
        assert_eq!(BUILT.load(Ordering::SeqCst), 2);
        assert!(!OpHandle::ptr_eq(&op, &replica));
        let mut out = 0;
        replica.compute1(&3, &mut out).unwrap();
        assert_eq!(out, 4);
    }
}
