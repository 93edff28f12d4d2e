//! Algebra Coach - worksheet-driven algebra tutor
//!
//! Algebra Coach turns an uploaded worksheet into a set of problems and
//! coaches a student through each one in its own tutoring session. A
//! language model judges attempts and writes hints; everything else
//! (extraction, the session state machine, progress) is local.
//!
//! # Modules
//!
//! - [`extract`] - document formats, PDF conversion and candidate splitting
//! - [`normalize`] - candidates to problems with answer classification
//! - [`session`] - per-problem session tasks and the state machine
//! - [`backend`] - the tutor capability, retries and the LLM tutor
//! - [`progress`] - worksheet progress summaries
//! - [`coach`] - worksheet registry tying the above together
//! - [`config`] - configuration types and loading
//! - [`cli`] / [`repl`] - command-line interface

pub mod backend;
pub mod cli;
pub mod coach;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod llm;
pub mod normalize;
pub mod progress;
pub mod prompts;
pub mod repl;
pub mod session;

// Re-export commonly used types
pub use backend::{BackendError, Evaluation, LlmTutor, ProblemContext, RetryPolicy, TutorBackend};
pub use coach::{Coach, read_worksheet};
pub use config::{Config, LlmConfig, TutoringConfig};
pub use domain::{
    AbandonReason, AnswerKind, Confidence, Outcome, Problem, ProblemId, ProblemStatus, SessionState, Turn,
    TutoringSession, Worksheet, WorksheetId,
};
pub use error::{CoachError, CoachResult, ErrorKind};
pub use extract::{CommandExtractor, Document, DocumentFormat, ExtractionBackend, ExtractionError, Extractor};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use progress::ProgressSummary;
pub use session::{SessionHandle, TurnResult};
