//! Tutor backend capability
//!
//! The session engine delegates all natural-language judgment to a
//! [`TutorBackend`]. [`LlmTutor`] is the production implementation; tests
//! substitute scripted doubles. Retry and per-call timeouts are applied
//! around any backend by [`retry::call_with_retry`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CoachingStage, Confidence, Problem, Turn, TutoringSession};
use crate::llm::LlmError;

mod llm_tutor;
pub mod retry;

pub use llm_tutor::LlmTutor;
pub use retry::RetryPolicy;

/// Everything a backend may know about the problem being tutored
///
/// Scoped to one problem and one session; never carries another problem's
/// dialogue.
#[derive(Debug, Clone)]
pub struct ProblemContext {
    pub problem: Problem,
    pub attempt_count: u32,
    pub hint_level: u32,
    pub max_hint_level: u32,
    pub stage: CoachingStage,
}

impl ProblemContext {
    pub fn from_session(problem: &Problem, session: &TutoringSession) -> Self {
        Self {
            problem: problem.clone(),
            attempt_count: session.attempt_count,
            hint_level: session.hint_level,
            max_hint_level: session.max_hint_level,
            stage: session.coaching_stage(),
        }
    }
}

/// Judgment of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub correct: bool,
    pub feedback: String,
    pub confidence: Confidence,
}

/// Backend call failure, before the retry policy has been applied
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Fatal(String),
}

impl BackendError {
    /// Check if this error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }
}

impl From<LlmError> for BackendError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(d) => Self::Timeout(d),
            LlmError::RateLimited { retry_after } => Self::RateLimited {
                retry_after: Some(retry_after),
            },
            other if other.is_retryable() => Self::Transient(other.to_string()),
            other => Self::Fatal(other.to_string()),
        }
    }
}

/// Language-model capability used by tutoring sessions
#[async_trait]
pub trait TutorBackend: Send + Sync {
    /// Judge a student attempt
    async fn evaluate(&self, context: &ProblemContext, attempt: &str) -> Result<Evaluation, BackendError>;

    /// Produce the hint at `level` (1-based), given this session's dialogue only
    async fn hint(&self, context: &ProblemContext, history: &[Turn], level: u32) -> Result<String, BackendError>;

    /// Answer a free-form question about the problem without judging it
    async fn reply(&self, context: &ProblemContext, history: &[Turn], question: &str) -> Result<String, BackendError>;

    /// Explain the worked answer for a student who has given up
    async fn reveal(&self, context: &ProblemContext, history: &[Turn]) -> Result<String, BackendError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_errors_map_to_backend_errors() {
        let err: BackendError = LlmError::Timeout(Duration::from_secs(5)).into();
        assert_eq!(err, BackendError::Timeout(Duration::from_secs(5)));
        assert!(err.is_retryable());

        let err: BackendError = LlmError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        }
        .into();
        assert!(matches!(err, BackendError::Transient(_)));

        let err: BackendError = LlmError::ApiError {
            status: 400,
            message: "bad request".to_string(),
        }
        .into();
        assert!(matches!(err, BackendError::Fatal(_)));
        assert!(!err.is_retryable());
    }
}
