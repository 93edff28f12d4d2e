//! TutoringSession domain type
//!
//! The session record is owned by a single session task. Everything outside
//! that task sees clones of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ProblemId, SessionId, WorksheetId};
use super::problem::ProblemStatus;

/// Tutoring session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the student's next answer
    #[default]
    AwaitingAttempt,
    /// A hint was just delivered
    HintGiven,
    /// An attempt is being judged
    Evaluating,
    /// Terminal: answered correctly
    Solved,
    /// Terminal: exited or timed out
    Abandoned,
}

impl SessionState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Solved | Self::Abandoned)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingAttempt => write!(f, "awaiting_attempt"),
            Self::HintGiven => write!(f, "hint_given"),
            Self::Evaluating => write!(f, "evaluating"),
            Self::Solved => write!(f, "solved"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Solved,
    Abandoned,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Solved => write!(f, "solved"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Why a session was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// The student exited the problem
    StudentExit,
    /// No activity within the idle timeout
    Timeout,
    /// The student gave up and was shown the worked answer
    Revealed,
}

impl std::fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StudentExit => write!(f, "student exit"),
            Self::Timeout => write!(f, "timeout"),
            Self::Revealed => write!(f, "answer revealed"),
        }
    }
}

/// How much to trust a judgment or an extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    High,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Who spoke a dialogue turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Student,
    Tutor,
}

/// What a dialogue turn carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// Student answer
    Attempt,
    /// Tutor judgment of an attempt
    Feedback,
    /// Tutor hint
    Hint,
    /// Student question, not judged as an attempt
    Question,
    /// Tutor answer to a question
    Reply,
    /// Worked answer shown when the student gives up
    Reveal,
}

/// One entry in the session dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Strictly increasing within a session, starting at 1
    pub seq: u64,
    pub role: TurnRole,
    pub kind: TurnKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Where the student is in the coaching arc, used to shape hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachingStage {
    /// Nothing attempted yet
    GettingStarted,
    /// Attempted, no hints yet
    FirstTries,
    /// Hints given, narrowing in on the mistake
    Diagnose,
    /// The next hint is the last one allowed
    FinalPush,
}

impl std::fmt::Display for CoachingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GettingStarted => write!(f, "getting_started"),
            Self::FirstTries => write!(f, "first_tries"),
            Self::Diagnose => write!(f, "diagnose"),
            Self::FinalPush => write!(f, "final_push"),
        }
    }
}

/// Per-problem tutoring dialogue and its state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutoringSession {
    pub id: SessionId,
    pub worksheet_id: WorksheetId,
    pub problem_id: ProblemId,
    pub state: SessionState,

    /// Set once, when the session becomes terminal
    pub outcome: Option<Outcome>,
    pub abandon_reason: Option<AbandonReason>,

    /// Hints delivered so far; never decreases
    pub hint_level: u32,
    pub max_hint_level: u32,

    /// Attempts that were judged
    pub attempt_count: u32,

    /// Attempts judged since the last hint
    pub attempts_since_hint: u32,

    turns: Vec<Turn>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TutoringSession {
    /// Create a session in `AwaitingAttempt`
    pub fn new(worksheet_id: WorksheetId, problem_id: ProblemId, max_hint_level: u32) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            worksheet_id,
            problem_id,
            state: SessionState::AwaitingAttempt,
            outcome: None,
            abandon_reason: None,
            hint_level: 0,
            max_hint_level,
            attempt_count: 0,
            attempts_since_hint: 0,
            turns: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Dialogue so far, in order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    /// Whether another hint may be issued
    pub fn hints_remaining(&self) -> bool {
        self.hint_level < self.max_hint_level
    }

    /// Status of the owning problem implied by this session
    pub fn problem_status(&self) -> ProblemStatus {
        match self.outcome {
            Some(Outcome::Solved) => ProblemStatus::Solved,
            Some(Outcome::Abandoned) => ProblemStatus::Abandoned,
            None => ProblemStatus::InProgress,
        }
    }

    /// Coaching stage for the next hint
    pub fn coaching_stage(&self) -> CoachingStage {
        if self.attempt_count == 0 {
            CoachingStage::GettingStarted
        } else if self.hint_level + 1 >= self.max_hint_level {
            CoachingStage::FinalPush
        } else if self.hint_level == 0 {
            CoachingStage::FirstTries
        } else {
            CoachingStage::Diagnose
        }
    }

    /// Append a turn, returning its sequence number
    pub fn push_turn(&mut self, role: TurnRole, kind: TurnKind, content: impl Into<String>) -> u64 {
        let seq = self.turns.last().map(|t| t.seq + 1).unwrap_or(1);
        let now = Utc::now();
        self.turns.push(Turn {
            seq,
            role,
            kind,
            content: content.into(),
            timestamp: now,
        });
        self.updated_at = now;
        seq
    }

    /// Record a judged attempt and the tutor's feedback
    pub fn record_attempt(&mut self, attempt: &str, feedback: &str) {
        self.push_turn(TurnRole::Student, TurnKind::Attempt, attempt);
        self.push_turn(TurnRole::Tutor, TurnKind::Feedback, feedback);
        self.attempt_count += 1;
        self.attempts_since_hint += 1;
    }

    /// Record a delivered hint, raising the hint level by one
    ///
    /// Returns false without change when the maximum is already reached.
    pub fn record_hint(&mut self, hint: &str) -> bool {
        if !self.hints_remaining() {
            return false;
        }
        self.push_turn(TurnRole::Tutor, TurnKind::Hint, hint);
        self.hint_level += 1;
        self.attempts_since_hint = 0;
        true
    }

    /// Record a free-form question and the tutor's reply
    ///
    /// Leaves attempt and hint counts alone.
    pub fn record_question(&mut self, question: &str, reply: &str) {
        self.push_turn(TurnRole::Student, TurnKind::Question, question);
        self.push_turn(TurnRole::Tutor, TurnKind::Reply, reply);
    }

    /// Record the worked answer and abandon with reason `Revealed`
    ///
    /// A no-op on a terminal session.
    pub fn reveal(&mut self, explanation: &str) {
        if self.is_terminal() {
            return;
        }
        self.push_turn(TurnRole::Tutor, TurnKind::Reveal, explanation);
        self.abandon(AbandonReason::Revealed);
    }

    /// Mark solved; a no-op on a terminal session
    pub fn solve(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.state = SessionState::Solved;
        self.outcome = Some(Outcome::Solved);
        self.updated_at = Utc::now();
    }

    /// Mark abandoned; a no-op on a terminal session
    pub fn abandon(&mut self, reason: AbandonReason) {
        if self.is_terminal() {
            return;
        }
        self.state = SessionState::Abandoned;
        self.outcome = Some(Outcome::Abandoned);
        self.abandon_reason = Some(reason);
        self.updated_at = Utc::now();
    }
}
