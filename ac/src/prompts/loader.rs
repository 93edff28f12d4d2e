//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::domain::{AnswerKind, CoachingStage, Problem};

/// Context for rendering prompt templates
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    /// Statement plus choices, as the student sees it
    pub problem: String,
    pub equation: Option<String>,
    pub has_diagram: bool,
    pub diagram_page: Option<u32>,
    pub answer_kind: String,
    pub is_multiple_choice: bool,
    /// Answer key, when the worksheet has one
    pub expected: Option<String>,
    pub attempt_count: u32,
    pub hint_level: u32,
    pub max_hint_level: u32,
    /// 1-based number of the hint being requested
    pub hint_number: u32,
    pub stage: String,
    /// Stage booleans for conditional rendering
    pub stage_getting_started: bool,
    pub stage_first_tries: bool,
    pub stage_diagnose: bool,
    pub stage_final_push: bool,
}

impl PromptContext {
    /// Build a context for one problem at the given point in its session
    pub fn for_problem(
        problem: &Problem,
        attempt_count: u32,
        hint_level: u32,
        max_hint_level: u32,
        stage: CoachingStage,
    ) -> Self {
        debug!(problem_id = %problem.id, %attempt_count, %hint_level, %stage, "PromptContext::for_problem: called");
        Self {
            problem: problem.display_text(),
            equation: problem.structured.as_ref().and_then(|s| s.equation.clone()),
            has_diagram: problem.reference.is_some(),
            diagram_page: problem.reference.as_ref().map(|r| r.page),
            answer_kind: problem.answer.kind.to_string(),
            is_multiple_choice: problem.answer.kind == AnswerKind::MultipleChoice,
            expected: problem.answer.expected.clone(),
            attempt_count,
            hint_level,
            max_hint_level,
            hint_number: hint_level + 1,
            stage: stage.to_string(),
            stage_getting_started: stage == CoachingStage::GettingStarted,
            stage_first_tries: stage == CoachingStage::FirstTries,
            stage_diagnose: stage == CoachingStage::Diagnose,
            stage_final_push: stage == CoachingStage::FinalPush,
        }
    }
}

/// Prompts go to a model, not a browser: no HTML escaping of `=` and friends
fn engine() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.algebra-coach/prompts/`)
    user_dir: Option<PathBuf>,
    /// Repo default directory (e.g., `prompts/`)
    repo_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader rooted at the given directory
    ///
    /// Looks for `.algebra-coach/prompts/` and `prompts/` under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let user_dir = root.join(".algebra-coach/prompts");
        let repo_dir = root.join("prompts");
        debug!(?user_dir, ?repo_dir, "PromptLoader::new: called");

        Self {
            hbs: engine(),
            user_dir: user_dir.exists().then_some(user_dir),
            repo_dir: repo_dir.exists().then_some(repo_dir),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self {
            hbs: engine(),
            user_dir: None,
            repo_dir: None,
        }
    }

    /// Load a template by name, honouring the override chain
    pub fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        for dir in [&self.user_dir, &self.repo_dir].into_iter().flatten() {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found on disk");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: using embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, stage = %context.stage, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}
