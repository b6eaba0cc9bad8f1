//! Candidate filtering.
//!
//! The registry supplies every implementation answering to the requested
//! name, in priority order. Three stable filters then narrow the list:
//! special type, arity, output type. Nothing is instantiated here; every
//! decision is made over declared metadata.

use crate::core::error::{MatchReport, RejectReason};
use crate::matching::registry::{Candidate, PluginIndex};
use crate::matching::{OpEnvironment, OpRef};
use crate::special::{Arity, Flavor, SpecialType};
use log::{debug, trace};

/// Candidates for `oref`, keeping the registry's priority order.
///
/// An empty result is not an error here; the matcher reports it.
pub fn query<I: PluginIndex + ?Sized>(index: &I, oref: &OpRef, arity: Option<Arity>) -> Vec<Candidate> {
    query_with_report(index, oref, arity).0
}

/// Like [`query`], also returning why each dropped candidate was dropped.
pub fn query_with_report<I: PluginIndex + ?Sized>(
    index: &I,
    oref: &OpRef,
    arity: Option<Arity>,
) -> (Vec<Candidate>, MatchReport) {
    let mut report = MatchReport::new();
    let found = index.find_candidates(oref);
    trace!("{} registered candidates for {}", found.len(), oref);

    let mut candidates: Vec<Candidate> = Vec::with_capacity(found.len());
    for candidate in found {
        // First failing filter wins.
        let reason = special_type_reason(&candidate, oref)
            .or_else(|| arity_reason(&candidate, arity))
            .or_else(|| output_reason(&candidate, oref));
        match reason {
            Some(reason) => report.reject(&candidate.id, reason),
            None => candidates.push(candidate),
        }
    }

    debug!(
        "Query {} kept {} candidates, dropped {}",
        oref,
        candidates.len(),
        report.len()
    );
    (candidates, report)
}

fn special_type_reason(candidate: &Candidate, oref: &OpRef) -> Option<RejectReason> {
    let requested = oref.special_types();
    if requested.is_empty() {
        return None;
    }
    let declared = &candidate.info.special_types;
    let implements = declared
        .iter()
        .any(|d| requested.iter().any(|r| d.implements(*r)));
    (!implements).then_some(RejectReason::SpecialType)
}

fn arity_reason(candidate: &Candidate, arity: Option<Arity>) -> Option<RejectReason> {
    let requested = arity?;
    match candidate.info.declared_arity() {
        Some(declared) if declared == requested => None,
        Some(declared) => Some(RejectReason::Arity {
            declared: declared.count(),
            requested: requested.count(),
        }),
        None => Some(RejectReason::SpecialType),
    }
}

fn output_reason(candidate: &Candidate, oref: &OpRef) -> Option<RejectReason> {
    let requested = oref.output_type()?;
    match &candidate.info.output {
        Some(declared) if requested.is_assignable_from(declared) => None,
        Some(declared) => Some(RejectReason::OutputType {
            declared: declared.clone(),
            requested: requested.clone(),
        }),
        None => Some(RejectReason::OutputType {
            declared: crate::core::types::DataType::Any,
            requested: requested.clone(),
        }),
    }
}

/// Listing helpers over the special-op candidates of an environment.
pub struct SpecialOps;

impl SpecialOps {
    /// Special ops answering to `name`, optionally narrowed to one arity
    /// and one flavor.
    pub fn candidates(
        env: &OpEnvironment,
        name: &str,
        arity: Option<Arity>,
        flavor: Option<Flavor>,
    ) -> Vec<Candidate> {
        let builder = OpRef::builder().name(name);
        let builder = match flavor {
            Some(Flavor::Computer) => builder.special_type(SpecialType::NullaryComputer),
            Some(Flavor::Function) => builder.special_type(SpecialType::NullaryFunction),
            Some(Flavor::Inplace) => builder.special_type(SpecialType::UnaryInplace),
            None => builder,
        };
        query(env.registry(), &builder.build(), arity)
            .into_iter()
            .filter(|c| !c.info.special_types.is_empty())
            .collect()
    }
}
