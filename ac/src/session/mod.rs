//! Per-problem tutoring sessions
//!
//! Each session is owned by one task ([`SessionHandle`] talks to it over a
//! channel), so turns for a problem are serialized while different problems
//! proceed independently.

mod actor;
mod engine;
mod messages;

use serde::Serialize;

use crate::domain::{Confidence, SessionState, TutoringSession};

pub use actor::SessionHandle;
pub use engine::{SessionEngine, answers_match};
pub use messages::SessionCommand;

/// What one command did to a session
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    /// State after the command
    pub state: SessionState,

    /// States passed through, in order. `HintGiven` only appears here.
    pub path: Vec<SessionState>,

    /// Tutor judgment, for attempts
    pub feedback: Option<String>,

    /// Hint delivered by this command, if any
    pub hint: Option<String>,

    /// Tutor answer to a question, or the worked answer on reveal
    pub reply: Option<String>,

    pub hint_level: u32,

    /// Trust in the judgment, for attempts
    pub confidence: Option<Confidence>,

    pub snapshot: TutoringSession,
}

impl TurnResult {
    pub fn is_solved(&self) -> bool {
        self.state == SessionState::Solved
    }
}
