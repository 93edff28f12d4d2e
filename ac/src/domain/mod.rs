//! Domain types for Algebra Coach
//!
//! - [`Worksheet`]: one uploaded document's ordered problems
//! - [`Problem`]: a single exercise with its expected answer
//! - [`TutoringSession`]: the per-problem dialogue and state machine record

mod id;
mod problem;
mod session;
mod worksheet;

pub use id::{ProblemId, SessionId, WorksheetId, generate_id};
pub use problem::{AnswerKind, AnswerSpec, Choice, DiagramRef, Problem, ProblemStatus, StructuredData};
pub use session::{
    AbandonReason, CoachingStage, Confidence, Outcome, SessionState, Turn, TurnKind, TurnRole, TutoringSession,
};
pub use worksheet::{SourceDocument, Worksheet};
