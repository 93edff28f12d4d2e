//! Problem domain type
//!
//! A single algebra exercise isolated from a worksheet, with the advisory
//! classification of the answer it expects.

use serde::{Deserialize, Serialize};

use super::id::ProblemId;

/// Where a problem stands within its worksheet
///
/// Derived from the problem's session, never stored on the problem itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProblemStatus {
    /// No session started yet
    #[default]
    Unstarted,
    /// A session is live
    InProgress,
    /// The latest session ended with a correct answer
    Solved,
    /// The latest session was exited or timed out
    Abandoned,
}

impl ProblemStatus {
    /// All statuses, in display order
    pub const ALL: [ProblemStatus; 4] = [Self::Unstarted, Self::InProgress, Self::Solved, Self::Abandoned];
}

impl std::fmt::Display for ProblemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Solved => write!(f, "solved"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Advisory classification of the expected answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// A single number, e.g. `27` or `-2/3`
    Numeric,
    /// An equation or algebraic expression, e.g. `x = 5` or `(7x - 6)(7x + 6)`
    Expression,
    /// Pick one of the listed choices
    MultipleChoice,
    /// No pattern matched; evaluated free-form
    #[default]
    Unrecognized,
}

impl std::fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Expression => write!(f, "expression"),
            Self::MultipleChoice => write!(f, "multiple choice"),
            Self::Unrecognized => write!(f, "free-form"),
        }
    }
}

/// What a correct answer looks like
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnswerSpec {
    pub kind: AnswerKind,

    /// Expected answer from an answer key, when the worksheet carries one
    pub expected: Option<String>,
}

/// One listed answer choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Label as printed: `1`..`4` or `A`..`D`
    pub label: String,
    pub text: String,
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) {}", self.label, self.text)
    }
}

/// Structured parts recognised in the statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StructuredData {
    /// Answer choices, in source order
    pub choices: Vec<Choice>,

    /// Equation form found in the statement, e.g. `3x + 7 = 22`
    pub equation: Option<String>,
}

impl StructuredData {
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty() && self.equation.is_none()
    }
}

/// The statement refers to a figure on its source page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramRef {
    /// 1-based page of the source document
    pub page: u32,

    /// The word that signalled the figure ("graph", "table", ...)
    pub cue: String,
}

/// A single algebra exercise with its expected answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,

    /// Number as printed in the source
    pub number: u32,

    /// Statement text, without numbering, choices or answer-key lines
    pub statement: String,

    /// Choices and equation form, if any were recognised
    pub structured: Option<StructuredData>,

    /// Figure referenced by the statement
    pub reference: Option<DiagramRef>,

    pub answer: AnswerSpec,

    /// 1-based page the problem started on
    pub page: u32,
}

impl Problem {
    /// Answer choices, empty unless multiple choice
    pub fn choices(&self) -> &[Choice] {
        self.structured.as_ref().map(|s| s.choices.as_slice()).unwrap_or_default()
    }

    /// Statement with choices appended, as shown to the student
    pub fn display_text(&self) -> String {
        let mut text = self.statement.clone();
        for choice in self.choices() {
            text.push('\n');
            text.push_str(&choice.to_string());
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc_problem() -> Problem {
        Problem {
            id: ProblemId::from("q3"),
            number: 3,
            statement: "The expression 49x^2 - 36 is equivalent to".to_string(),
            structured: Some(StructuredData {
                choices: vec![
                    Choice {
                        label: "1".to_string(),
                        text: "(7x - 6)^2".to_string(),
                    },
                    Choice {
                        label: "2".to_string(),
                        text: "(7x - 6)(7x + 6)".to_string(),
                    },
                ],
                equation: None,
            }),
            reference: None,
            answer: AnswerSpec {
                kind: AnswerKind::MultipleChoice,
                expected: Some("2".to_string()),
            },
            page: 1,
        }
    }

    #[test]
    fn test_display_text_includes_choices() {
        let text = mc_problem().display_text();
        assert!(text.starts_with("The expression"));
        assert!(text.contains("\n(1) (7x - 6)^2"));
        assert!(text.contains("\n(2) (7x - 6)(7x + 6)"));
    }

    #[test]
    fn test_choices_empty_without_structure() {
        let mut problem = mc_problem();
        problem.structured = None;
        assert!(problem.choices().is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProblemStatus::InProgress.to_string(), "in_progress");
        assert_eq!(ProblemStatus::default(), ProblemStatus::Unstarted);
    }
}
