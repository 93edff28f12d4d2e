//! Worksheet domain type

use serde::{Deserialize, Serialize};

use super::id::{ProblemId, WorksheetId};
use super::problem::Problem;
use super::session::Confidence;
use crate::extract::DocumentFormat;

/// Reference to the document a worksheet was extracted from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// File name or caller-supplied label
    pub name: String,
    pub format: DocumentFormat,
    pub byte_len: usize,

    /// `Low` when extraction fell back to the local text scan
    pub confidence: Confidence,

    /// Extraction and normalization warnings worth showing the student
    pub warnings: Vec<String>,
}

/// One uploaded document's ordered set of problems
///
/// Immutable once built; progress lives in the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worksheet {
    pub id: WorksheetId,
    pub source: SourceDocument,
    problems: Vec<Problem>,
}

impl Worksheet {
    /// Build a worksheet from problems in source order
    pub fn new(source: SourceDocument, problems: Vec<Problem>) -> Self {
        Self {
            id: WorksheetId::new(&source.name),
            source,
            problems,
        }
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn problem(&self, id: &ProblemId) -> Option<&Problem> {
        self.problems.iter().find(|p| &p.id == id)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}
