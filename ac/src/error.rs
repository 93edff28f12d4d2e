//! Coach error taxonomy
//!
//! Every failure carries a stable [`ErrorKind`] plus a human-readable message.
//! "Incorrect answer" is not an error: it is a normal session transition.

use thiserror::Error;

use crate::domain::{Outcome, ProblemId, WorksheetId};

/// Coarse error class used to decide how a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad, empty or unsupported input; not retried
    Input,
    /// Backend unreachable or timing out after the retry policy ran
    TransientBackend,
    /// Operation invalid for the current session/problem state
    State,
    /// Unknown references or a lost session task
    DataIntegrity,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::TransientBackend => write!(f, "transient_backend"),
            Self::State => write!(f, "state"),
            Self::DataIntegrity => write!(f, "data_integrity"),
        }
    }
}

/// Errors surfaced by the extraction, normalization and tutoring core
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoachError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not extract text from the document: {0}")]
    ExtractionFailure(String),

    #[error("No problems were found in the document")]
    EmptyDocument,

    #[error("Could not find an answerable problem statement: {0}")]
    MalformedProblem(String),

    #[error("Type an answer before submitting")]
    EmptySubmission,

    #[error("This session has already ended ({0})")]
    SessionTerminated(Outcome),

    #[error("All {max} hints have been used for this problem")]
    HintLimitReached { max: u32 },

    #[error("Try the problem once more before asking for another hint")]
    HintWithheld,

    #[error("The tutor is unavailable after {attempts} attempts: {reason}")]
    TutorBackendUnavailable { attempts: u32, reason: String },

    #[error("Problem {0} already has an active session")]
    SessionAlreadyActive(ProblemId),

    #[error("Problem {0} is already solved")]
    ProblemAlreadySolved(ProblemId),

    #[error("Problem {0} has no session; start one first")]
    NoSession(ProblemId),

    #[error("Unknown worksheet: {0}")]
    UnknownWorksheet(WorksheetId),

    #[error("Unknown problem: {0}")]
    UnknownProblem(ProblemId),

    #[error("Session task for problem {0} is no longer running")]
    SessionUnavailable(ProblemId),
}

impl CoachError {
    /// Stable class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) | Self::EmptyDocument | Self::MalformedProblem(_) | Self::EmptySubmission => {
                ErrorKind::Input
            }
            Self::ExtractionFailure(_) | Self::TutorBackendUnavailable { .. } => ErrorKind::TransientBackend,
            Self::SessionTerminated(_)
            | Self::HintLimitReached { .. }
            | Self::HintWithheld
            | Self::SessionAlreadyActive(_)
            | Self::ProblemAlreadySolved(_)
            | Self::NoSession(_) => ErrorKind::State,
            Self::UnknownWorksheet(_) | Self::UnknownProblem(_) | Self::SessionUnavailable(_) => {
                ErrorKind::DataIntegrity
            }
        }
    }

    /// Stable machine-readable code, e.g. `hint_limit_reached`
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ExtractionFailure(_) => "extraction_failure",
            Self::EmptyDocument => "empty_document",
            Self::MalformedProblem(_) => "malformed_problem",
            Self::EmptySubmission => "empty_submission",
            Self::SessionTerminated(_) => "session_terminated",
            Self::HintLimitReached { .. } => "hint_limit_reached",
            Self::HintWithheld => "hint_withheld",
            Self::TutorBackendUnavailable { .. } => "tutor_backend_unavailable",
            Self::SessionAlreadyActive(_) => "session_already_active",
            Self::ProblemAlreadySolved(_) => "problem_already_solved",
            Self::NoSession(_) => "no_session",
            Self::UnknownWorksheet(_) => "unknown_worksheet",
            Self::UnknownProblem(_) => "unknown_problem",
            Self::SessionUnavailable(_) => "session_unavailable",
        }
    }
}

/// Result alias for core operations
pub type CoachResult<T> = Result<T, CoachError>;
