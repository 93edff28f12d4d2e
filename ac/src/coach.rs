//! Coach - worksheet registry and session orchestration
//!
//! Owns the loaded worksheets and one [`SessionHandle`] per started
//! problem. Problem status is never stored; it is read from the live
//! session snapshots whenever it is needed. Registry locks are never held
//! across a session call, so a slow tutor reply on one problem does not
//! hold up any other.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{LlmTutor, RetryPolicy, TutorBackend};
use crate::config::{Config, TutoringConfig};
use crate::domain::{Outcome, ProblemId, ProblemStatus, SourceDocument, TutoringSession, Worksheet, WorksheetId};
use crate::error::{CoachError, CoachResult};
use crate::extract::{CommandExtractor, Document, ExtractionBackend, Extractor};
use crate::llm;
use crate::normalize;
use crate::progress::{self, ProgressSummary};
use crate::prompts::PromptLoader;
use crate::session::{SessionEngine, SessionHandle, TurnResult};

type SessionKey = (WorksheetId, ProblemId);

/// Entry point for loading worksheets and tutoring their problems
pub struct Coach {
    tutoring: TutoringConfig,
    retry: RetryPolicy,
    extractor: Extractor,
    backend: Arc<dyn TutorBackend>,
    worksheets: RwLock<HashMap<WorksheetId, Arc<Worksheet>>>,
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
}

impl Coach {
    /// Create a coach over explicit backends
    pub fn new(config: &Config, extraction: Arc<dyn ExtractionBackend>, backend: Arc<dyn TutorBackend>) -> Self {
        debug!(
            max_hint_level = config.tutoring.max_hint_level,
            max_attempts = config.retry.max_attempts,
            "Coach::new: called"
        );
        Self {
            tutoring: config.tutoring.clone(),
            retry: RetryPolicy::from(&config.retry),
            extractor: Extractor::new(extraction, config.extraction.repeated_line_min_occurrences),
            backend,
            worksheets: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a coach with the configured converter and LLM tutor
    ///
    /// Prompt overrides are looked up under `prompt_root`.
    pub fn from_config(config: &Config, prompt_root: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(provider = %config.llm.provider, model = %config.llm.model, "Coach::from_config: called");
        let client = llm::create_client(&config.llm)?;
        let tutor = LlmTutor::new(client, PromptLoader::new(prompt_root), config.llm.max_tokens);
        let extraction = CommandExtractor::from_config(&config.extraction);
        Ok(Self::new(config, Arc::new(extraction), Arc::new(tutor)))
    }

    /// Extract and normalize a document into a registered worksheet
    ///
    /// Every load gets its own worksheet, even for a document name that is
    /// already registered.
    pub async fn load_worksheet(&self, document: Document) -> CoachResult<Arc<Worksheet>> {
        debug!(name = %document.name, format = %document.format, "load_worksheet: called");
        let mut worksheet = read_worksheet(&self.extractor, document).await?;

        let mut worksheets = self.worksheets.write().await;
        while worksheets.contains_key(&worksheet.id) {
            warn!(worksheet_id = %worksheet.id, "Worksheet id already registered, generating another");
            worksheet.id = WorksheetId::new(&worksheet.source.name);
        }
        let worksheet = Arc::new(worksheet);
        worksheets.insert(worksheet.id.clone(), worksheet.clone());

        info!(
            worksheet_id = %worksheet.id,
            problems = worksheet.len(),
            confidence = %worksheet.source.confidence,
            "Worksheet loaded"
        );
        Ok(worksheet)
    }

    pub async fn worksheet(&self, worksheet_id: &WorksheetId) -> CoachResult<Arc<Worksheet>> {
        self.worksheets
            .read()
            .await
            .get(worksheet_id)
            .cloned()
            .ok_or_else(|| CoachError::UnknownWorksheet(worksheet_id.clone()))
    }

    /// IDs of all loaded worksheets
    pub async fn worksheet_ids(&self) -> Vec<WorksheetId> {
        let mut ids: Vec<WorksheetId> = self.worksheets.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Start tutoring a problem
    ///
    /// Fails with `SessionAlreadyActive` while a live session exists and with
    /// `ProblemAlreadySolved` once solved. An abandoned problem may be
    /// restarted with a fresh session.
    pub async fn start_session(&self, worksheet_id: &WorksheetId, problem_id: &ProblemId) -> CoachResult<TutoringSession> {
        debug!(%worksheet_id, %problem_id, "start_session: called");
        let worksheet = self.worksheet(worksheet_id).await?;
        self.spawn_session(&worksheet, problem_id).await
    }

    /// Register a fresh session for a problem of a resolved worksheet
    ///
    /// Rechecks under the sessions lock that `worksheet` is still the one
    /// registered, so a concurrent close cannot leave an orphaned session.
    async fn spawn_session(&self, worksheet: &Arc<Worksheet>, problem_id: &ProblemId) -> CoachResult<TutoringSession> {
        let worksheet_id = &worksheet.id;
        let problem = worksheet
            .problem(problem_id)
            .cloned()
            .ok_or_else(|| CoachError::UnknownProblem(problem_id.clone()))?;

        let key = (worksheet_id.clone(), problem_id.clone());
        let mut sessions = self.sessions.write().await;
        let registered = self
            .worksheets
            .read()
            .await
            .get(worksheet_id)
            .is_some_and(|current| Arc::ptr_eq(current, worksheet));
        if !registered {
            return Err(CoachError::UnknownWorksheet(worksheet_id.clone()));
        }
        if let Some(existing) = sessions.get(&key) {
            match existing.snapshot().outcome {
                None => return Err(CoachError::SessionAlreadyActive(problem_id.clone())),
                Some(Outcome::Solved) => return Err(CoachError::ProblemAlreadySolved(problem_id.clone())),
                Some(Outcome::Abandoned) => info!(%worksheet_id, %problem_id, "Restarting abandoned problem"),
            }
        }

        let session = TutoringSession::new(worksheet_id.clone(), problem_id.clone(), self.tutoring.max_hint_level);
        let engine = SessionEngine::new(problem, session, self.backend.clone(), self.retry, self.tutoring.clone());
        let handle = SessionHandle::spawn(engine, self.tutoring.session_timeout());
        let snapshot = handle.snapshot();
        sessions.insert(key, handle);
        Ok(snapshot)
    }

    /// Look up the session handle for a problem
    async fn handle(&self, worksheet_id: &WorksheetId, problem_id: &ProblemId) -> CoachResult<SessionHandle> {
        let worksheet = self.worksheet(worksheet_id).await?;
        if worksheet.problem(problem_id).is_none() {
            return Err(CoachError::UnknownProblem(problem_id.clone()));
        }
        self.sessions
            .read()
            .await
            .get(&(worksheet_id.clone(), problem_id.clone()))
            .cloned()
            .ok_or_else(|| CoachError::NoSession(problem_id.clone()))
    }

    pub async fn submit_attempt(
        &self,
        worksheet_id: &WorksheetId,
        problem_id: &ProblemId,
        text: &str,
    ) -> CoachResult<TurnResult> {
        debug!(%worksheet_id, %problem_id, "submit_attempt: called");
        let handle = self.handle(worksheet_id, problem_id).await?;
        handle.submit_attempt(text).await
    }

    pub async fn request_hint(&self, worksheet_id: &WorksheetId, problem_id: &ProblemId) -> CoachResult<TurnResult> {
        debug!(%worksheet_id, %problem_id, "request_hint: called");
        let handle = self.handle(worksheet_id, problem_id).await?;
        handle.request_hint().await
    }

    pub async fn ask(&self, worksheet_id: &WorksheetId, problem_id: &ProblemId, question: &str) -> CoachResult<TurnResult> {
        debug!(%worksheet_id, %problem_id, "ask: called");
        let handle = self.handle(worksheet_id, problem_id).await?;
        handle.ask(question).await
    }

    /// Show the worked answer; the problem ends up abandoned
    pub async fn reveal(&self, worksheet_id: &WorksheetId, problem_id: &ProblemId) -> CoachResult<TurnResult> {
        debug!(%worksheet_id, %problem_id, "reveal: called");
        let handle = self.handle(worksheet_id, problem_id).await?;
        handle.reveal().await
    }

    pub async fn abandon(&self, worksheet_id: &WorksheetId, problem_id: &ProblemId) -> CoachResult<TurnResult> {
        debug!(%worksheet_id, %problem_id, "abandon: called");
        let handle = self.handle(worksheet_id, problem_id).await?;
        handle.abandon().await
    }

    /// Read-only copy of a problem's latest session
    pub async fn snapshot(&self, worksheet_id: &WorksheetId, problem_id: &ProblemId) -> CoachResult<TutoringSession> {
        Ok(self.handle(worksheet_id, problem_id).await?.snapshot())
    }

    /// Status of every problem, in worksheet order
    pub async fn statuses(&self, worksheet_id: &WorksheetId) -> CoachResult<Vec<(ProblemId, ProblemStatus)>> {
        debug!(%worksheet_id, "statuses: called");
        let worksheet = self.worksheet(worksheet_id).await?;
        let sessions = self.sessions.read().await;
        Ok(worksheet
            .problems()
            .iter()
            .map(|p| {
                let status = sessions
                    .get(&(worksheet_id.clone(), p.id.clone()))
                    .map(|h| h.snapshot().problem_status())
                    .unwrap_or_default();
                (p.id.clone(), status)
            })
            .collect())
    }

    pub async fn problem_status(&self, worksheet_id: &WorksheetId, problem_id: &ProblemId) -> CoachResult<ProblemStatus> {
        self.statuses(worksheet_id)
            .await?
            .into_iter()
            .find(|(id, _)| id == problem_id)
            .map(|(_, status)| status)
            .ok_or_else(|| CoachError::UnknownProblem(problem_id.clone()))
    }

    /// Recompute the worksheet's progress from live sessions
    pub async fn get_progress(&self, worksheet_id: &WorksheetId) -> CoachResult<ProgressSummary> {
        debug!(%worksheet_id, "get_progress: called");
        let statuses = self.statuses(worksheet_id).await?;
        Ok(progress::summarize(worksheet_id, statuses.into_iter().map(|(_, s)| s)))
    }

    /// First problem that is neither solved nor live, in worksheet order
    pub async fn next_open_problem(&self, worksheet_id: &WorksheetId) -> CoachResult<Option<ProblemId>> {
        Ok(self
            .statuses(worksheet_id)
            .await?
            .into_iter()
            .find(|(_, s)| matches!(s, ProblemStatus::Unstarted | ProblemStatus::Abandoned))
            .map(|(id, _)| id))
    }

    /// Abandon every live session and unregister the worksheet
    ///
    /// Returns the final progress.
    pub async fn close_worksheet(&self, worksheet_id: &WorksheetId) -> CoachResult<ProgressSummary> {
        debug!(%worksheet_id, "close_worksheet: called");
        let worksheet = self
            .worksheets
            .write()
            .await
            .remove(worksheet_id)
            .ok_or_else(|| CoachError::UnknownWorksheet(worksheet_id.clone()))?;

        let handles: Vec<SessionHandle> = {
            let mut sessions = self.sessions.write().await;
            let keys: Vec<SessionKey> = sessions.keys().filter(|(ws, _)| ws == worksheet_id).cloned().collect();
            keys.iter().filter_map(|k| sessions.remove(k)).collect()
        };

        let live: Vec<&SessionHandle> = handles.iter().filter(|h| !h.snapshot().is_terminal()).collect();
        let results = futures::future::join_all(live.iter().map(|h| h.abandon())).await;
        for (handle, result) in live.iter().zip(results) {
            if let Err(e) = result {
                warn!(%worksheet_id, problem_id = %handle.problem_id(), error = %e, "Session did not abandon cleanly");
            }
        }

        let by_problem: HashMap<&ProblemId, ProblemStatus> = handles
            .iter()
            .map(|h| (h.problem_id(), h.snapshot().problem_status()))
            .collect();
        let summary = progress::summarize(
            worksheet_id,
            worksheet
                .problems()
                .iter()
                .map(|p| by_problem.get(&p.id).copied().unwrap_or_default()),
        );

        info!(%worksheet_id, abandoned = live.len(), summary = %summary, "Worksheet closed");
        Ok(summary)
    }
}

/// Build a worksheet from a document without registering it
///
/// Skipped candidates and removed duplicates become source warnings.
pub async fn read_worksheet(extractor: &Extractor, document: Document) -> CoachResult<Worksheet> {
    debug!(name = %document.name, "read_worksheet: called");
    let extraction = extractor.extract(&document).await?;
    let normalized = normalize::normalize_all(&extraction.candidates)?;

    let mut warnings = extraction.warnings;
    for skipped in &normalized.skipped {
        let label = skipped
            .number
            .map(|n| format!("problem {}", n))
            .unwrap_or_else(|| "a problem".to_string());
        warnings.push(format!("Skipped {} on page {}: {}", label, skipped.page, skipped.reason));
    }
    if normalized.duplicates_removed > 0 {
        warnings.push(format!("Removed {} repeated problem text(s)", normalized.duplicates_removed));
    }

    let source = SourceDocument {
        name: document.name,
        format: extraction.format,
        byte_len: document.bytes.len(),
        confidence: extraction.confidence,
        warnings,
    };
    Ok(Worksheet::new(source, normalized.problems))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::backend::mock::{ScriptedBackend, Step};
    use crate::backend::Evaluation;
    use crate::config::RetryConfig;
    use crate::domain::{Confidence, SessionState};
    use crate::extract::ExtractionError;
    use crate::extract::mock::FixedBackend;

    const WORKSHEET: &str = "Algebra Review\nName: ________\n\n1. Solve for x: 3x + 7 = 22\n2. Simplify 2(x + 3) - 4\n3. What is 15% of 80?\n";

    fn config() -> Config {
        Config {
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                call_timeout_ms: 2_000,
            },
            ..Default::default()
        }
    }

    fn coach(backend: ScriptedBackend) -> (Coach, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let extraction = Arc::new(FixedBackend(Err(ExtractionError::Unavailable("unused".to_string()))));
        (Coach::new(&config(), extraction, backend.clone()), backend)
    }

    async fn load(coach: &Coach) -> WorksheetId {
        let doc = Document::new(WORKSHEET.as_bytes().to_vec(), "text/plain", "review.txt");
        coach.load_worksheet(doc).await.unwrap().id.clone()
    }

    fn q(n: &str) -> ProblemId {
        ProblemId::from(n)
    }

    #[tokio::test]
    async fn test_load_worksheet_registers_problems() {
        let (coach, _) = coach(ScriptedBackend::new());
        let ws = load(&coach).await;

        let worksheet = coach.worksheet(&ws).await.unwrap();
        assert_eq!(worksheet.len(), 3);
        assert_eq!(worksheet.problems()[0].id, q("q1"));
        assert_eq!(worksheet.source.confidence, Confidence::High);

        let progress = coach.get_progress(&ws).await.unwrap();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.unstarted, 3);
        assert_eq!(coach.worksheet_ids().await, vec![ws]);
    }

    #[tokio::test]
    async fn test_load_empty_document_fails() {
        let (coach, _) = coach(ScriptedBackend::new());
        let doc = Document::new(b"   \n".to_vec(), "txt", "blank.txt");
        assert_eq!(coach.load_worksheet(doc).await.err(), Some(CoachError::EmptyDocument));
        assert!(coach.worksheet_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_same_document_loads_as_independent_worksheets() {
        let (coach, _) = coach(ScriptedBackend::new().verdict(true, "Correct!"));
        let first = load(&coach).await;
        let second = load(&coach).await;

        assert_ne!(first, second);
        assert_eq!(coach.worksheet_ids().await.len(), 2);

        coach.start_session(&first, &q("q1")).await.unwrap();
        coach.submit_attempt(&first, &q("q1"), "x = 5").await.unwrap();

        coach.start_session(&second, &q("q1")).await.unwrap();
        assert_eq!(coach.problem_status(&second, &q("q1")).await.unwrap(), ProblemStatus::InProgress);
        assert_eq!(coach.get_progress(&first).await.unwrap().solved, 1);
        assert_eq!(coach.get_progress(&second).await.unwrap().solved, 0);
        assert_eq!(coach.snapshot(&second, &q("q1")).await.unwrap().worksheet_id, second);
    }

    #[tokio::test]
    async fn test_session_not_registered_for_closed_worksheet() {
        let (coach, _) = coach(ScriptedBackend::new());
        let ws = load(&coach).await;
        let worksheet = coach.worksheet(&ws).await.unwrap();

        coach.close_worksheet(&ws).await.unwrap();

        assert_eq!(
            coach.spawn_session(&worksheet, &q("q1")).await.err(),
            Some(CoachError::UnknownWorksheet(ws.clone()))
        );
        assert!(coach.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_reveal_marks_problem_abandoned() {
        let backend = ScriptedBackend::new()
            .reply_text("Percent means out of a hundred.")
            .reveal_text("The answer is 12.");
        let (coach, _) = coach(backend);
        let ws = load(&coach).await;

        coach.start_session(&ws, &q("q3")).await.unwrap();
        let answered = coach.ask(&ws, &q("q3"), "What does percent mean?").await.unwrap();
        assert_eq!(answered.snapshot.attempt_count, 0);

        let revealed = coach.reveal(&ws, &q("q3")).await.unwrap();
        assert_eq!(revealed.reply.as_deref(), Some("The answer is 12."));
        assert_eq!(coach.problem_status(&ws, &q("q3")).await.unwrap(), ProblemStatus::Abandoned);
        assert_eq!(coach.get_progress(&ws).await.unwrap().abandoned, 1);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (coach, _) = coach(ScriptedBackend::new());
        let ws = load(&coach).await;

        coach.start_session(&ws, &q("q1")).await.unwrap();
        assert_eq!(
            coach.start_session(&ws, &q("q1")).await.err(),
            Some(CoachError::SessionAlreadyActive(q("q1")))
        );
        assert_eq!(coach.problem_status(&ws, &q("q1")).await.unwrap(), ProblemStatus::InProgress);
    }

    #[tokio::test]
    async fn test_solving_updates_progress() {
        let (coach, _) = coach(ScriptedBackend::new().verdict(true, "Correct!"));
        let ws = load(&coach).await;

        coach.start_session(&ws, &q("q1")).await.unwrap();
        let result = coach.submit_attempt(&ws, &q("q1"), "x=5").await.unwrap();
        assert_eq!(result.state, SessionState::Solved);

        let progress = coach.get_progress(&ws).await.unwrap();
        assert_eq!(progress.solved, 1);
        assert_eq!(progress.unstarted, 2);
        assert_eq!(
            coach.start_session(&ws, &q("q1")).await.err(),
            Some(CoachError::ProblemAlreadySolved(q("q1")))
        );
        assert_eq!(coach.next_open_problem(&ws).await.unwrap(), Some(q("q2")));
    }

    #[tokio::test]
    async fn test_abandoned_problem_can_restart() {
        let (coach, _) = coach(ScriptedBackend::new());
        let ws = load(&coach).await;

        let first = coach.start_session(&ws, &q("q2")).await.unwrap();
        coach.abandon(&ws, &q("q2")).await.unwrap();
        assert_eq!(coach.problem_status(&ws, &q("q2")).await.unwrap(), ProblemStatus::Abandoned);

        let second = coach.start_session(&ws, &q("q2")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(coach.problem_status(&ws, &q("q2")).await.unwrap(), ProblemStatus::InProgress);
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let (coach, _) = coach(ScriptedBackend::new());
        let ws = load(&coach).await;

        assert_eq!(
            coach.submit_attempt(&ws, &q("q1"), "5").await.err(),
            Some(CoachError::NoSession(q("q1")))
        );
        assert_eq!(
            coach.start_session(&ws, &q("q9")).await.err(),
            Some(CoachError::UnknownProblem(q("q9")))
        );
        let missing = WorksheetId::from("nope");
        assert_eq!(
            coach.get_progress(&missing).await.err(),
            Some(CoachError::UnknownWorksheet(missing.clone()))
        );
    }

    #[tokio::test]
    async fn test_hint_context_is_isolated_per_problem() {
        let backend = ScriptedBackend::new()
            .verdict(false, "Not quite.")
            .hint_text("Undo the +7 first.")
            .verdict(false, "Check the distribution.")
            .hint_text("Multiply 2 into the bracket.");
        let (coach, backend) = coach(backend);
        let ws = load(&coach).await;

        coach.start_session(&ws, &q("q1")).await.unwrap();
        coach.start_session(&ws, &q("q2")).await.unwrap();
        coach.submit_attempt(&ws, &q("q1"), "x = 4").await.unwrap();
        coach.submit_attempt(&ws, &q("q2"), "2x + 3").await.unwrap();

        let log = backend.hint_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].0, "q2");
        assert!(!log[1].1.iter().any(|t| t.contains("x = 4") || t.contains("+7")));
        assert_eq!(coach.snapshot(&ws, &q("q1")).await.unwrap().hint_level, 1);
        assert_eq!(coach.snapshot(&ws, &q("q2")).await.unwrap().turns().len(), 3);
    }

    #[tokio::test]
    async fn test_slow_problem_does_not_block_another() {
        let backend = ScriptedBackend::new()
            .evaluation(Step::Delay(
                Duration::from_millis(500),
                Evaluation {
                    correct: true,
                    feedback: "Yes.".to_string(),
                    confidence: Confidence::High,
                },
            ))
            .hint_text("Think about what 15% means.");
        let (coach, _) = coach(backend);
        let coach = Arc::new(coach);
        let ws = load(&coach).await;

        coach.start_session(&ws, &q("q1")).await.unwrap();
        coach.start_session(&ws, &q("q3")).await.unwrap();

        let slow = {
            let coach = coach.clone();
            let ws = ws.clone();
            tokio::spawn(async move { coach.submit_attempt(&ws, &q("q1"), "x = 5").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let hint = tokio::time::timeout(Duration::from_millis(200), coach.request_hint(&ws, &q("q3")))
            .await
            .expect("hint blocked by another problem")
            .unwrap();
        assert_eq!(hint.hint_level, 1);

        assert!(slow.await.unwrap().unwrap().is_solved());
    }

    #[tokio::test]
    async fn test_close_worksheet_abandons_live_sessions() {
        let (coach, _) = coach(ScriptedBackend::new().verdict(true, "Correct!"));
        let ws = load(&coach).await;

        coach.start_session(&ws, &q("q1")).await.unwrap();
        coach.submit_attempt(&ws, &q("q1"), "x = 5").await.unwrap();
        coach.start_session(&ws, &q("q2")).await.unwrap();

        let summary = coach.close_worksheet(&ws).await.unwrap();
        assert_eq!(summary.solved, 1);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.unstarted, 1);
        assert!(coach.worksheet(&ws).await.is_err());
        assert_eq!(
            coach.close_worksheet(&ws).await.err(),
            Some(CoachError::UnknownWorksheet(ws.clone()))
        );
    }
}
