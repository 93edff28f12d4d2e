//! LLM-backed tutor
//!
//! Renders the evaluate, hint, ask and reveal prompts and interprets the
//! model's replies.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{BackendError, Evaluation, ProblemContext, TutorBackend};
use crate::domain::{Confidence, Turn, TurnRole};
use crate::llm::{CompletionRequest, LlmClient, Message, Role};
use crate::prompts::{PromptContext, PromptLoader};

/// Phrases meaning the tutor is still probing, not confirming
const PROBING_PHRASES: &[&str] = &[
    "walk me through",
    "how did you",
    "can you explain",
    "show me your",
    "what steps",
    "how you got",
    "explain your",
    "step by step",
    "step-by-step",
];

/// Phrases that hedge or reject the answer
const INCORRECT_PHRASES: &[&str] = &[
    "not quite",
    "not correct",
    "incorrect",
    "try again",
    "not right",
    "that's not",
    "wrong",
    "close but",
    "almost",
    "not exactly",
    "check your",
    "look again",
    "are you sure",
];

/// Phrases that unambiguously confirm a correct answer
const CONFIRM_PHRASES: &[&str] = &[
    "that's correct",
    "is correct",
    "you're correct",
    "that's the right answer",
    "you got it",
    "you nailed it",
    "exactly right",
    "you solved it",
    "well done!",
    "great work!",
    "perfect!",
    "that's it!",
];

#[derive(Debug, Deserialize)]
struct Verdict {
    correct: bool,
    #[serde(default)]
    feedback: String,
}

/// Tutor backend that asks a language model
pub struct LlmTutor {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    max_tokens: u32,
}

impl LlmTutor {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            max_tokens,
        }
    }

    fn prompt_context(context: &ProblemContext) -> PromptContext {
        PromptContext::for_problem(
            &context.problem,
            context.attempt_count,
            context.hint_level,
            context.max_hint_level,
            context.stage,
        )
    }

    async fn ask(&self, system_prompt: String, messages: Vec<Message>) -> Result<String, BackendError> {
        let request = CompletionRequest {
            system_prompt,
            messages,
            max_tokens: self.max_tokens,
        };
        let response = self.llm.complete(request).await?;
        response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BackendError::Fatal("model returned an empty reply".to_string()))
    }
}

#[async_trait]
impl TutorBackend for LlmTutor {
    async fn evaluate(&self, context: &ProblemContext, attempt: &str) -> Result<Evaluation, BackendError> {
        debug!(problem_id = %context.problem.id, attempt_len = attempt.len(), "evaluate: called");
        let system_prompt = self
            .prompts
            .render("evaluate", &Self::prompt_context(context))
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        let reply = self
            .ask(system_prompt, vec![Message::user(format!("My answer: {}", attempt))])
            .await?;
        Ok(parse_verdict(&reply))
    }

    async fn hint(&self, context: &ProblemContext, history: &[Turn], level: u32) -> Result<String, BackendError> {
        debug!(problem_id = %context.problem.id, %level, history_len = history.len(), "hint: called");
        let system_prompt = self
            .prompts
            .render("hint", &Self::prompt_context(context))
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        self.ask(system_prompt, dialogue_messages(history, "Can I have a hint?")).await
    }

    async fn reply(&self, context: &ProblemContext, history: &[Turn], question: &str) -> Result<String, BackendError> {
        debug!(problem_id = %context.problem.id, question_len = question.len(), "reply: called");
        let system_prompt = self
            .prompts
            .render("ask", &Self::prompt_context(context))
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        self.ask(system_prompt, dialogue_messages(history, question)).await
    }

    async fn reveal(&self, context: &ProblemContext, history: &[Turn]) -> Result<String, BackendError> {
        debug!(problem_id = %context.problem.id, history_len = history.len(), "reveal: called");
        let system_prompt = self
            .prompts
            .render("reveal", &Self::prompt_context(context))
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        self.ask(system_prompt, dialogue_messages(history, "I give up. Can you show me the answer?"))
            .await
    }
}

/// Map the session dialogue onto alternating chat messages
///
/// Starts with a user turn and ends with `closing` from the student,
/// merging consecutive turns from the same side.
fn dialogue_messages(history: &[Turn], closing: &str) -> Vec<Message> {
    let mut messages = vec![Message::user("I'm working on this problem.")];
    for turn in history {
        let role = match turn.role {
            TurnRole::Student => Role::User,
            TurnRole::Tutor => Role::Assistant,
        };
        push_merged(&mut messages, role, &turn.content);
    }
    push_merged(&mut messages, Role::User, closing);
    messages
}

fn push_merged(messages: &mut Vec<Message>, role: Role, content: &str) {
    if let Some(last) = messages.last_mut()
        && last.role == role
    {
        last.content.push_str("\n\n");
        last.content.push_str(content);
        return;
    }
    messages.push(Message {
        role,
        content: content.to_string(),
    });
}

/// Interpret a model reply as a verdict
///
/// A JSON object (optionally fenced) gives a high-confidence judgment.
/// Anything else falls back to the phrase heuristic at low confidence.
pub fn parse_verdict(reply: &str) -> Evaluation {
    if let Some(json) = extract_json_object(reply)
        && let Ok(verdict) = serde_json::from_str::<Verdict>(json)
    {
        let feedback = if verdict.feedback.trim().is_empty() {
            default_feedback(verdict.correct)
        } else {
            verdict.feedback.trim().to_string()
        };
        return Evaluation {
            correct: verdict.correct,
            feedback,
            confidence: Confidence::High,
        };
    }

    warn!(reply_len = reply.len(), "parse_verdict: reply is not a JSON verdict, using phrase heuristic");
    Evaluation {
        correct: confirms_correct(reply),
        feedback: reply.trim().to_string(),
        confidence: Confidence::Low,
    }
}

fn default_feedback(correct: bool) -> String {
    if correct {
        "That's correct!".to_string()
    } else {
        "Not quite. Give it another look.".to_string()
    }
}

/// Slice from the first `{` to the last `}`
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Strong confirmation, with probing and hedging phrases taking precedence
pub fn confirms_correct(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    if PROBING_PHRASES.iter().any(|p| lower.contains(p)) {
        return false;
    }
    if INCORRECT_PHRASES.iter().any(|p| lower.contains(p)) {
        return false;
    }
    CONFIRM_PHRASES.iter().any(|p| lower.contains(p))
}
