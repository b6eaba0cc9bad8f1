//! Error types for imops.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Name the request and every candidate considered when matching fails
//! - Keep internal rejection causes (conformance, instantiation) separate from
//!   the user-visible match failures they may eventually turn into
//! - Convert into the top-level [`OpsError`] with `?`

use crate::core::img::Dims;
use crate::core::types::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Top-level error type for imops.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    #[error("Instantiation error: {0}")]
    Instantiation(#[from] InstantiationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Dims, got: Dims },

    #[error("Op '{op}' is missing bound input {index}")]
    MissingInput { op: String, index: usize },

    #[error("Argument {index}: expected {expected}, got {got}")]
    ArgumentType {
        index: usize,
        expected: DataType,
        got: DataType,
    },

    #[error("Op '{op}' failed: {error}")]
    Compute { op: String, error: String },

    #[error("Worker for chunk {chunk} panicked")]
    WorkerPanicked { chunk: usize },

    #[error("{0}")]
    Other(String),
}

/// User-visible failures of the matcher.
#[derive(Error, Debug, Clone)]
pub enum MatchError {
    #[error("No matching op for {request}\n{report}")]
    NoMatch { request: String, report: MatchReport },

    #[error(
        "Ambiguous match for {request}: {} candidates tie on priority and specificity: {}",
        candidates.len(),
        candidates.join(", ")
    )]
    Ambiguous {
        request: String,
        candidates: Vec<String>,
    },
}

/// Errors raised by an op factory while building an instance.
///
/// The matcher never surfaces these directly: a failing candidate is
/// dropped and recorded in the [`MatchReport`].
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstantiationError {
    #[error("missing argument '{name}'")]
    MissingArgument { name: String },

    #[error("argument '{name}' is invalid: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    #[error("initialization failed: {0}")]
    Initialization(String),
}

/// Errors while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config from {path}: {error}")]
    Io { path: String, error: std::io::Error },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

// ============================================================================
// Error Utilities
// ============================================================================

impl OpsError {
    /// Create a compute error for the named op.
    pub fn compute(op: impl Into<String>, error: impl fmt::Display) -> Self {
        OpsError::Compute {
            op: op.into(),
            error: error.to_string(),
        }
    }

    /// Check if this error came from op resolution rather than execution.
    pub fn is_match_failure(&self) -> bool {
        matches!(self, OpsError::Match(_))
    }

    /// Check if this error means no candidate matched at all.
    pub fn is_no_match(&self) -> bool {
        matches!(self, OpsError::Match(MatchError::NoMatch { .. }))
    }

    /// Check if this error means several candidates tied.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, OpsError::Match(MatchError::Ambiguous { .. }))
    }
}

impl MatchError {
    /// The request string this error was raised for.
    pub fn request(&self) -> &str {
        match self {
            MatchError::NoMatch { request, .. } | MatchError::Ambiguous { request, .. } => request,
        }
    }

    /// Implementation ids named by this error.
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            MatchError::NoMatch { report, .. } => {
                report.rejections.iter().map(|r| r.candidate.as_str()).collect()
            }
            MatchError::Ambiguous { candidates, .. } => {
                candidates.iter().map(|c| c.as_str()).collect()
            }
        }
    }
}

/// Result type alias for imops operations.
pub type OpResult<T> = Result<T, OpsError>;

/// Result type alias for op factories.
pub type InstantiationResult<T> = Result<T, InstantiationError>;

// ============================================================================
// Match Report
// ============================================================================

/// Why a candidate was not selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Does not implement any of the requested special types.
    SpecialType,
    /// Declared arity differs from the requested arity.
    Arity { declared: usize, requested: usize },
    /// Declared output type is not assignable to the requested one.
    OutputType { declared: DataType, requested: DataType },
    /// The implementation offers no typed view of the requested shape.
    NoTypedView { view: String },
    /// Wrong number of positional arguments.
    ArgumentCount { min: usize, max: usize, got: usize },
    /// An argument is not assignable to the declared port.
    ArgumentType {
        index: usize,
        expected: DataType,
        got: DataType,
    },
    /// The factory failed to build an instance.
    Instantiation(InstantiationError),
    /// The instance rejected its binding via `conforms()`.
    Conformance,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::SpecialType => write!(f, "does not implement the requested special type"),
            RejectReason::Arity { declared, requested } => {
                write!(f, "arity {} (requested {})", declared, requested)
            }
            RejectReason::OutputType { declared, requested } => {
                write!(f, "output {} is not assignable to {}", declared, requested)
            }
            RejectReason::NoTypedView { view } => write!(f, "no typed view {}", view),
            RejectReason::ArgumentCount { min, max, got } => {
                write!(f, "expects {}..={} arguments, got {}", min, max, got)
            }
            RejectReason::ArgumentType { index, expected, got } => {
                write!(f, "argument {} expects {}, got {}", index, expected, got)
            }
            RejectReason::Instantiation(error) => write!(f, "instantiation failed: {}", error),
            RejectReason::Conformance => write!(f, "does not conform to the bound arguments"),
        }
    }
}

/// A single rejected candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Implementation id of the candidate.
    pub candidate: String,
    /// Why it was rejected.
    pub reason: RejectReason,
}

/// Every candidate considered for a request and why it lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Rejections in the order they happened.
    pub rejections: Vec<Rejection>,
}

impl MatchReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rejected candidate.
    pub fn reject(&mut self, candidate: impl Into<String>, reason: RejectReason) {
        self.rejections.push(Rejection {
            candidate: candidate.into(),
            reason,
        });
    }

    /// Number of rejected candidates.
    pub fn len(&self) -> usize {
        self.rejections.len()
    }

    /// Check if nothing was rejected.
    pub fn is_empty(&self) -> bool {
        self.rejections.is_empty()
    }

    /// Reason recorded for a candidate, if any.
    pub fn reason_for(&self, candidate: &str) -> Option<&RejectReason> {
        self.rejections
            .iter()
            .find(|r| r.candidate == candidate)
            .map(|r| &r.reason)
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rejections.is_empty() {
            return write!(f, "  no candidates registered");
        }
        for (i, rejection) in self.rejections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}. {}: {}", i + 1, rejection.candidate, rejection.reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_report_display() {
        let mut report = MatchReport::new();
        report.reject("math.subtract.real", RejectReason::Conformance);
        report.reject(
            "math.subtract.u8",
            RejectReason::ArgumentCount { min: 1, max: 2, got: 3 },
        );

        let text = report.to_string();
        assert!(text.contains("1. math.subtract.real"));
        assert!(text.contains("expects 1..=2 arguments, got 3"));
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_empty_report_display() {
        let report = MatchReport::new();
        assert_eq!(report.to_string(), "  no candidates registered");
    }

    #[test]
    fn test_ambiguous_lists_candidates() {
        let error = MatchError::Ambiguous {
            request: "math.add".to_string(),
            candidates: vec!["a".to_string(), "b".to_string()],
        };
        let text = error.to_string();
        assert!(text.contains("2 candidates"));
        assert!(text.contains("a, b"));
        assert_eq!(error.candidates(), vec!["a", "b"]);
    }

    #[test]
    fn test_error_predicates() {
        let error: OpsError = MatchError::NoMatch {
            request: "x".to_string(),
            report: MatchReport::new(),
        }
        .into();
        assert!(error.is_match_failure());
        assert!(error.is_no_match());
        assert!(!error.is_ambiguous());

        let error = OpsError::compute("copy.img", "boom");
        assert!(!error.is_match_failure());
        assert!(error.to_string().contains("boom"));
    }
}
