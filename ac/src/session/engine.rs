//! Tutoring session state machine
//!
//! The engine owns one session and is driven by its session task. It only
//! commits an attempt once the backend has judged it, so a failed or
//! dropped backend call leaves the recorded dialogue untouched.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::TurnResult;
use crate::backend::{Evaluation, ProblemContext, RetryPolicy, TutorBackend, retry};
use crate::config::TutoringConfig;
use crate::domain::{
    AbandonReason, AnswerKind, Confidence, Outcome, Problem, SessionState, TutoringSession,
};
use crate::error::{CoachError, CoachResult};
use crate::normalize::canonical_answer;

/// Feedback used when the answer key confirmed a match without the tutor
const FALLBACK_CORRECT_FEEDBACK: &str =
    "That matches the answer key. Nice work! (The tutor is offline, so this was checked by exact match.)";

/// Shown in place of a worked answer when the tutor is offline
const FALLBACK_REVEAL_NOTE: &str = "(The tutor is offline, so this comes straight from the answer key.)";

/// Per-problem state machine
pub struct SessionEngine {
    problem: Problem,
    session: TutoringSession,
    backend: Arc<dyn TutorBackend>,
    retry: RetryPolicy,
    policy: TutoringConfig,
    snapshot_tx: watch::Sender<TutoringSession>,
}

impl SessionEngine {
    pub fn new(
        problem: Problem,
        session: TutoringSession,
        backend: Arc<dyn TutorBackend>,
        retry: RetryPolicy,
        policy: TutoringConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(session.clone());
        Self {
            problem,
            session,
            backend,
            retry,
            policy,
            snapshot_tx,
        }
    }

    /// Receiver that sees every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<TutoringSession> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> TutoringSession {
        self.session.clone()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.session.outcome
    }

    pub fn is_terminal(&self) -> bool {
        self.session.is_terminal()
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.session.clone());
    }

    fn ensure_active(&self) -> CoachResult<()> {
        match self.session.outcome {
            Some(outcome) => Err(CoachError::SessionTerminated(outcome)),
            None => Ok(()),
        }
    }

    fn result(&self, path: Vec<SessionState>) -> TurnResult {
        TurnResult {
            state: self.session.state,
            path,
            feedback: None,
            hint: None,
            reply: None,
            hint_level: self.session.hint_level,
            confidence: None,
            snapshot: self.session.clone(),
        }
    }

    /// Judge a student attempt
    pub async fn submit_attempt(&mut self, text: &str) -> CoachResult<TurnResult> {
        debug!(problem_id = %self.problem.id, attempt_len = text.len(), "submit_attempt: called");
        self.ensure_active()?;
        let attempt = text.trim();
        if attempt.is_empty() {
            return Err(CoachError::EmptySubmission);
        }

        let prior = self.session.state;
        self.session.state = SessionState::Evaluating;
        self.publish();

        let evaluation = match self.evaluate(attempt).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                self.session.state = prior;
                self.publish();
                return Err(e);
            }
        };

        self.session.record_attempt(attempt, &evaluation.feedback);
        let mut path = vec![SessionState::Evaluating];

        if evaluation.correct {
            self.session.solve();
            path.push(SessionState::Solved);
            info!(problem_id = %self.problem.id, attempts = self.session.attempt_count, "Problem solved");
            self.publish();
            let mut result = self.result(path);
            result.feedback = Some(evaluation.feedback);
            result.confidence = Some(evaluation.confidence);
            return Ok(result);
        }

        let mut hint = None;
        if self.policy.auto_hint_on_incorrect && self.session.hints_remaining() {
            match self.fetch_hint().await {
                Ok(text) => {
                    self.session.record_hint(&text);
                    path.push(SessionState::HintGiven);
                    hint = Some(text);
                }
                Err(e) => {
                    warn!(problem_id = %self.problem.id, error = %e, "Automatic hint failed, keeping the judged attempt");
                }
            }
        }

        self.session.state = SessionState::AwaitingAttempt;
        path.push(SessionState::AwaitingAttempt);
        self.publish();

        let mut result = self.result(path);
        result.feedback = Some(evaluation.feedback);
        result.hint = hint;
        result.confidence = Some(evaluation.confidence);
        Ok(result)
    }

    /// Issue the next hint on request
    pub async fn request_hint(&mut self) -> CoachResult<TurnResult> {
        debug!(problem_id = %self.problem.id, hint_level = self.session.hint_level, "request_hint: called");
        self.ensure_active()?;
        if !self.session.hints_remaining() {
            return Err(CoachError::HintLimitReached {
                max: self.session.max_hint_level,
            });
        }
        if self.policy.require_attempt_between_hints
            && self.session.hint_level > 0
            && self.session.attempts_since_hint == 0
        {
            return Err(CoachError::HintWithheld);
        }

        let text = self.fetch_hint().await?;
        self.session.record_hint(&text);
        self.session.state = SessionState::AwaitingAttempt;
        self.publish();

        let mut result = self.result(vec![SessionState::HintGiven, SessionState::AwaitingAttempt]);
        result.hint = Some(text);
        Ok(result)
    }

    /// Answer a free-form question without judging it as an attempt
    pub async fn ask(&mut self, question: &str) -> CoachResult<TurnResult> {
        debug!(problem_id = %self.problem.id, question_len = question.len(), "ask: called");
        self.ensure_active()?;
        let question = question.trim();
        if question.is_empty() {
            return Err(CoachError::EmptySubmission);
        }

        let reply = self.fetch_reply(question).await?;
        self.session.record_question(question, &reply);
        self.session.state = SessionState::AwaitingAttempt;
        self.publish();

        let mut result = self.result(vec![SessionState::AwaitingAttempt]);
        result.reply = Some(reply);
        Ok(result)
    }

    /// Show the worked answer and end the session as abandoned
    ///
    /// With the tutor offline the answer key is shown instead. Without a key
    /// the error is returned and the session stays live.
    pub async fn reveal(&mut self) -> CoachResult<TurnResult> {
        debug!(problem_id = %self.problem.id, attempts = self.session.attempt_count, "reveal: called");
        self.ensure_active()?;

        let explanation = match self.fetch_reveal().await {
            Ok(text) => text,
            Err(e) => match self.problem.answer.expected.as_deref() {
                Some(expected) => {
                    warn!(problem_id = %self.problem.id, error = %e, "Tutor unavailable, revealing the answer key");
                    format!("The answer is {}. {}", expected, FALLBACK_REVEAL_NOTE)
                }
                None => return Err(e),
            },
        };

        self.session.reveal(&explanation);
        info!(problem_id = %self.problem.id, attempts = self.session.attempt_count, "Answer revealed");
        self.publish();

        let mut result = self.result(vec![SessionState::Abandoned]);
        result.reply = Some(explanation);
        Ok(result)
    }

    /// End the session on student exit or timeout
    ///
    /// Idempotent on an abandoned session.
    pub fn abandon(&mut self, reason: AbandonReason) -> CoachResult<TurnResult> {
        debug!(problem_id = %self.problem.id, %reason, "abandon: called");
        match self.session.outcome {
            Some(Outcome::Abandoned) => Ok(self.result(Vec::new())),
            Some(Outcome::Solved) => Err(CoachError::SessionTerminated(Outcome::Solved)),
            None => {
                self.session.abandon(reason);
                info!(problem_id = %self.problem.id, %reason, "Session abandoned");
                self.publish();
                Ok(self.result(vec![SessionState::Abandoned]))
            }
        }
    }

    async fn evaluate(&self, attempt: &str) -> CoachResult<Evaluation> {
        let context = ProblemContext::from_session(&self.problem, &self.session);
        let backend = &self.backend;
        let result = retry::call_with_retry(&self.retry, "evaluate", || backend.evaluate(&context, attempt)).await;

        match result {
            Ok(evaluation) => Ok(evaluation),
            Err(e @ CoachError::TutorBackendUnavailable { .. }) => {
                if self.policy.exact_match_fallback && answers_match(&self.problem, attempt) {
                    warn!(problem_id = %self.problem.id, error = %e, "Tutor unavailable, answer matched the key");
                    return Ok(Evaluation {
                        correct: true,
                        feedback: FALLBACK_CORRECT_FEEDBACK.to_string(),
                        confidence: Confidence::Low,
                    });
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_hint(&self) -> CoachResult<String> {
        let context = ProblemContext::from_session(&self.problem, &self.session);
        let history = self.session.turns();
        let level = self.session.hint_level + 1;
        let backend = &self.backend;
        retry::call_with_retry(&self.retry, "hint", || backend.hint(&context, history, level)).await
    }

    async fn fetch_reply(&self, question: &str) -> CoachResult<String> {
        let context = ProblemContext::from_session(&self.problem, &self.session);
        let history = self.session.turns();
        let backend = &self.backend;
        retry::call_with_retry(&self.retry, "reply", || backend.reply(&context, history, question)).await
    }

    async fn fetch_reveal(&self) -> CoachResult<String> {
        let context = ProblemContext::from_session(&self.problem, &self.session);
        let history = self.session.turns();
        let backend = &self.backend;
        retry::call_with_retry(&self.retry, "reveal", || backend.reveal(&context, history)).await
    }
}

/// Exact comparison against the answer key, if there is one
///
/// Case, whitespace and unicode minus are ignored. A leading `x =` may be
/// left off, but a different variable never matches. Multiple choice
/// accepts the label or the choice text.
pub fn answers_match(problem: &Problem, attempt: &str) -> bool {
    let Some(expected) = problem.answer.expected.as_deref() else {
        return false;
    };
    let expected = canonical_answer(expected);
    let attempt = canonical_answer(attempt);
    if attempt.is_empty() {
        return false;
    }
    if attempt == expected {
        return true;
    }
    let (attempt_var, attempt_value) = split_variable(&attempt);
    let (expected_var, expected_value) = split_variable(&expected);
    if attempt_value == expected_value && (attempt_var.is_none() || attempt_var == expected_var) {
        return true;
    }

    if problem.answer.kind == AnswerKind::MultipleChoice {
        let label = expected.trim_matches(|c| c == '(' || c == ')');
        let given = attempt.trim_matches(|c| c == '(' || c == ')');
        if given == label {
            return true;
        }
        return problem
            .choices()
            .iter()
            .any(|c| c.label.eq_ignore_ascii_case(label) && canonical_answer(&c.text) == attempt);
    }
    false
}

/// `x=5` -> `(Some('x'), "5")`
fn split_variable(answer: &str) -> (Option<char>, &str) {
    let mut chars = answer.chars();
    match (chars.next(), chars.next()) {
        (Some(v), Some('=')) if v.is_ascii_alphabetic() => (Some(v), &answer[2..]),
        _ => (None, answer),
    }
}
