//! Session task messages
//!
//! Commands for the per-session actor. Every command carries a oneshot
//! reply channel.

use tokio::sync::oneshot;

use super::TurnResult;
use crate::domain::AbandonReason;
use crate::error::CoachResult;

/// Response from session operations
pub type SessionResponse = CoachResult<TurnResult>;

/// Commands sent to a session task
#[derive(Debug)]
pub enum SessionCommand {
    SubmitAttempt {
        text: String,
        reply: oneshot::Sender<SessionResponse>,
    },
    RequestHint {
        reply: oneshot::Sender<SessionResponse>,
    },
    Ask {
        question: String,
        reply: oneshot::Sender<SessionResponse>,
    },
    Reveal {
        reply: oneshot::Sender<SessionResponse>,
    },
    Abandon {
        reason: AbandonReason,
        reply: oneshot::Sender<SessionResponse>,
    },
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitAttempt { .. } => "submit_attempt",
            Self::RequestHint { .. } => "request_hint",
            Self::Ask { .. } => "ask",
            Self::Reveal { .. } => "reveal",
            Self::Abandon { .. } => "abandon",
        }
    }
}
