//! Session task and its handle
//!
//! One task per tutoring session owns the [`SessionEngine`] and applies
//! commands in arrival order. Abandon is also signalled out of band so it
//! can interrupt a backend call that is still running, and an idle timer
//! abandons the session when no command arrives in time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use super::engine::SessionEngine;
use super::messages::{SessionCommand, SessionResponse};
use super::TurnResult;
use crate::domain::{AbandonReason, Outcome, ProblemId, TutoringSession};
use crate::error::{CoachError, CoachResult};

/// Handle to send commands to a session task
#[derive(Clone)]
pub struct SessionHandle {
    problem_id: ProblemId,
    tx: mpsc::Sender<SessionCommand>,
    cancel_tx: Arc<watch::Sender<bool>>,
    snapshot_rx: watch::Receiver<TutoringSession>,
}

impl SessionHandle {
    /// Spawn the task that owns `engine`
    ///
    /// With `idle_timeout` set, a live session that receives no command for
    /// that long is abandoned with reason `Timeout`.
    pub fn spawn(engine: SessionEngine, idle_timeout: Option<Duration>) -> Self {
        let snapshot = engine.snapshot();
        debug!(problem_id = %snapshot.problem_id, session_id = %snapshot.id, ?idle_timeout, "spawn: called");

        let (tx, rx) = mpsc::channel(32);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let snapshot_rx = engine.subscribe();

        tokio::spawn(actor_loop(engine, rx, cancel_rx, idle_timeout));

        info!(problem_id = %snapshot.problem_id, session_id = %snapshot.id, "Session started");

        Self {
            problem_id: snapshot.problem_id,
            tx,
            cancel_tx: Arc::new(cancel_tx),
            snapshot_rx,
        }
    }

    pub fn problem_id(&self) -> &ProblemId {
        &self.problem_id
    }

    /// Latest published copy of the session
    pub fn snapshot(&self) -> TutoringSession {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified on every session change
    pub fn subscribe(&self) -> watch::Receiver<TutoringSession> {
        self.snapshot_rx.clone()
    }

    pub async fn submit_attempt(&self, text: impl Into<String>) -> CoachResult<TurnResult> {
        let text = text.into();
        self.request(|reply| SessionCommand::SubmitAttempt { text, reply }).await
    }

    pub async fn request_hint(&self) -> CoachResult<TurnResult> {
        self.request(|reply| SessionCommand::RequestHint { reply }).await
    }

    /// Ask the tutor a question that is not judged as an attempt
    pub async fn ask(&self, question: impl Into<String>) -> CoachResult<TurnResult> {
        let question = question.into();
        self.request(|reply| SessionCommand::Ask { question, reply }).await
    }

    /// Give up on the problem and get the worked answer
    pub async fn reveal(&self) -> CoachResult<TurnResult> {
        debug!(problem_id = %self.problem_id, "reveal: called");
        self.request(|reply| SessionCommand::Reveal { reply }).await
    }

    /// Abandon the session, interrupting any turn in progress
    pub async fn abandon(&self) -> CoachResult<TurnResult> {
        debug!(problem_id = %self.problem_id, "abandon: called");
        let outcome = self.snapshot_rx.borrow().outcome;
        if outcome == Some(Outcome::Solved) {
            return Err(CoachError::SessionTerminated(Outcome::Solved));
        }
        self.cancel_tx.send_replace(true);
        self.request(|reply| SessionCommand::Abandon {
            reason: AbandonReason::StudentExit,
            reply,
        })
        .await
    }

    async fn request(&self, build: impl FnOnce(oneshot::Sender<SessionResponse>) -> SessionCommand) -> SessionResponse {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| CoachError::SessionUnavailable(self.problem_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| CoachError::SessionUnavailable(self.problem_id.clone()))?
    }
}

enum Action<'a> {
    Attempt(&'a str),
    Hint,
    Ask(&'a str),
    Reveal,
}

/// Resolves once abandon has been signalled
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    if cancel_rx.wait_for(|flag| *flag).await.is_err() {
        // Every handle is gone; the command channel closes too
        std::future::pending::<()>().await;
    }
}

/// Run one turn unless abandon arrives first
async fn run_turn(engine: &mut SessionEngine, cancel_rx: &mut watch::Receiver<bool>, action: Action<'_>) -> SessionResponse {
    let finished = {
        let turn = async {
            match action {
                Action::Attempt(text) => engine.submit_attempt(text).await,
                Action::Hint => engine.request_hint().await,
                Action::Ask(question) => engine.ask(question).await,
                Action::Reveal => engine.reveal().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancelled(cancel_rx) => None,
            result = turn => Some(result),
        }
    };

    match finished {
        Some(result) => result,
        None => {
            let _ = engine.abandon(AbandonReason::StudentExit);
            Err(CoachError::SessionTerminated(engine.outcome().unwrap_or(Outcome::Abandoned)))
        }
    }
}

/// The actor loop that processes commands
async fn actor_loop(
    mut engine: SessionEngine,
    mut rx: mpsc::Receiver<SessionCommand>,
    mut cancel_rx: watch::Receiver<bool>,
    idle_timeout: Option<Duration>,
) {
    let problem_id = engine.snapshot().problem_id;
    debug!(%problem_id, "actor_loop: started");

    loop {
        let idle = idle_timeout.filter(|_| !engine.is_terminal());
        let cmd = match idle {
            Some(limit) => match tokio::time::timeout(limit, rx.recv()).await {
                Ok(cmd) => cmd,
                Err(_) => {
                    info!(%problem_id, idle_secs = limit.as_secs_f64(), "Session idle, abandoning");
                    let _ = engine.abandon(AbandonReason::Timeout);
                    continue;
                }
            },
            None => rx.recv().await,
        };
        let Some(cmd) = cmd else {
            break;
        };
        debug!(%problem_id, command = cmd.name(), "actor_loop: received command");

        match cmd {
            SessionCommand::SubmitAttempt { text, reply } => {
                let result = run_turn(&mut engine, &mut cancel_rx, Action::Attempt(&text)).await;
                let _ = reply.send(result);
            }
            SessionCommand::RequestHint { reply } => {
                let result = run_turn(&mut engine, &mut cancel_rx, Action::Hint).await;
                let _ = reply.send(result);
            }
            SessionCommand::Ask { question, reply } => {
                let result = run_turn(&mut engine, &mut cancel_rx, Action::Ask(&question)).await;
                let _ = reply.send(result);
            }
            SessionCommand::Reveal { reply } => {
                let result = run_turn(&mut engine, &mut cancel_rx, Action::Reveal).await;
                let _ = reply.send(result);
            }
            SessionCommand::Abandon { reason, reply } => {
                let _ = reply.send(engine.abandon(reason));
            }
        }
    }

    debug!(%problem_id, "actor_loop: all handles dropped, exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::backend::mock::{ScriptedBackend, Step};
    use crate::backend::{Evaluation, RetryPolicy};
    use crate::config::TutoringConfig;
    use crate::domain::{AnswerKind, AnswerSpec, Confidence, Problem, SessionState, WorksheetId};

    fn problem() -> Problem {
        Problem {
            id: ProblemId::from("q1"),
            number: 1,
            statement: "Solve for x: 3x + 7 = 22".to_string(),
            structured: None,
            reference: None,
            answer: AnswerSpec {
                kind: AnswerKind::Expression,
                expected: None,
            },
            page: 1,
        }
    }

    fn spawn(backend: ScriptedBackend, idle_timeout: Option<Duration>) -> SessionHandle {
        let policy = TutoringConfig::default();
        let session = TutoringSession::new(WorksheetId::from("ws"), ProblemId::from("q1"), policy.max_hint_level);
        let retry = RetryPolicy {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            call_timeout: Duration::from_secs(5),
            jitter: false,
        };
        let engine = SessionEngine::new(problem(), session, Arc::new(backend), retry, policy);
        SessionHandle::spawn(engine, idle_timeout)
    }

    fn slow_correct(delay: Duration) -> Step<Evaluation> {
        Step::Delay(
            delay,
            Evaluation {
                correct: true,
                feedback: "Right!".to_string(),
                confidence: Confidence::High,
            },
        )
    }

    #[tokio::test]
    async fn test_submit_through_handle() {
        let handle = spawn(ScriptedBackend::new().verdict(true, "Right!"), None);

        let result = handle.submit_attempt("x = 5").await.unwrap();

        assert!(result.is_solved());
        assert_eq!(handle.snapshot().state, SessionState::Solved);
        assert_eq!(handle.problem_id().as_str(), "q1");
    }

    #[tokio::test]
    async fn test_snapshot_shows_evaluating_during_call() {
        let handle = spawn(ScriptedBackend::new().evaluation(slow_correct(Duration::from_millis(200))), None);

        let pending = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.submit_attempt("x = 5").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.snapshot().state, SessionState::Evaluating);

        assert!(pending.await.unwrap().unwrap().is_solved());
    }

    #[tokio::test]
    async fn test_abandon_interrupts_in_flight_evaluation() {
        let handle = spawn(ScriptedBackend::new().evaluation(slow_correct(Duration::from_secs(2))), None);

        let pending = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.submit_attempt("x = 5").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.abandon().await.unwrap();

        let interrupted = pending.await.unwrap();
        assert_eq!(interrupted.err(), Some(CoachError::SessionTerminated(Outcome::Abandoned)));

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, SessionState::Abandoned);
        assert_eq!(snapshot.abandon_reason, Some(AbandonReason::StudentExit));
        assert_eq!(snapshot.attempt_count, 0);
        assert!(snapshot.turns().is_empty());
    }

    #[tokio::test]
    async fn test_abandon_solved_session_is_rejected() {
        let handle = spawn(ScriptedBackend::new().verdict(true, "Right!"), None);
        handle.submit_attempt("x = 5").await.unwrap();

        assert_eq!(
            handle.abandon().await.err(),
            Some(CoachError::SessionTerminated(Outcome::Solved))
        );
        assert_eq!(handle.snapshot().outcome, Some(Outcome::Solved));
    }

    #[tokio::test]
    async fn test_abandon_twice_is_harmless() {
        let handle = spawn(ScriptedBackend::new(), None);

        assert_eq!(handle.abandon().await.unwrap().state, SessionState::Abandoned);
        assert_eq!(handle.abandon().await.unwrap().state, SessionState::Abandoned);
        assert_eq!(
            handle.submit_attempt("x = 5").await.err(),
            Some(CoachError::SessionTerminated(Outcome::Abandoned))
        );
    }

    #[tokio::test]
    async fn test_ask_and_reveal_through_handle() {
        let handle = spawn(
            ScriptedBackend::new()
                .reply_text("Find the x that balances both sides.")
                .reveal_text("The answer is x = 5."),
            None,
        );

        let answered = handle.ask("What are we finding?").await.unwrap();
        assert_eq!(answered.reply.as_deref(), Some("Find the x that balances both sides."));
        assert_eq!(handle.snapshot().outcome, None);

        let revealed = handle.reveal().await.unwrap();
        assert_eq!(revealed.state, SessionState::Abandoned);
        assert_eq!(handle.snapshot().abandon_reason, Some(AbandonReason::Revealed));
        assert_eq!(
            handle.ask("and now?").await.err(),
            Some(CoachError::SessionTerminated(Outcome::Abandoned))
        );
    }

    #[tokio::test]
    async fn test_idle_timeout_abandons() {
        let handle = spawn(ScriptedBackend::new(), Some(Duration::from_millis(50)));

        tokio::time::sleep(Duration::from_millis(250)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, SessionState::Abandoned);
        assert_eq!(snapshot.abandon_reason, Some(AbandonReason::Timeout));
        assert_eq!(
            handle.request_hint().await.err(),
            Some(CoachError::SessionTerminated(Outcome::Abandoned))
        );
    }

    #[tokio::test]
    async fn test_activity_resets_idle_timer() {
        let handle = spawn(
            ScriptedBackend::new().verdict(false, "No.").hint_text("h1").verdict(false, "No."),
            Some(Duration::from_millis(150)),
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.submit_attempt("1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.submit_attempt("2").await.unwrap();

        assert_eq!(handle.snapshot().outcome, None);
    }
}
