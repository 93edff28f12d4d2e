//! Problem normalization
//!
//! Converts raw candidates into structured [`Problem`] records: statement,
//! choices, equation form, diagram reference and expected answer.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{AnswerSpec, DiagramRef, Problem, ProblemId, StructuredData};
use crate::error::{CoachError, CoachResult};
use crate::extract::RawCandidate;

mod classify;

pub use classify::canonical_answer;

/// Normalize one candidate
///
/// `number` is the number to use when the candidate carries none.
pub fn normalize(candidate: &RawCandidate, number: u32) -> CoachResult<Problem> {
    let number = candidate.number.unwrap_or(number);
    debug!(%number, page = candidate.page, "normalize: called");

    let (text, expected) = classify::take_answer_line(&candidate.text);
    let (statement, choices) = classify::take_choices(&text);
    let statement = statement.trim().to_string();

    if statement.is_empty() || !statement.chars().any(|c| c.is_alphanumeric()) {
        return Err(CoachError::MalformedProblem(format!(
            "problem {} on page {} has no statement",
            number, candidate.page
        )));
    }

    let equation = classify::find_equation(&statement);
    let reference = classify::diagram_cue(&statement).map(|cue| DiagramRef {
        page: candidate.page,
        cue,
    });
    let kind = classify::classify_answer(&statement, &choices, expected.as_deref());
    let structured = StructuredData { choices, equation };

    Ok(Problem {
        id: ProblemId::for_number(number, 1),
        number,
        statement,
        structured: (!structured.is_empty()).then_some(structured),
        reference,
        answer: AnswerSpec { kind, expected },
        page: candidate.page,
    })
}

/// A candidate that could not be turned into a problem
#[derive(Debug, Clone, Serialize)]
pub struct Skipped {
    pub page: u32,
    pub number: Option<u32>,
    pub reason: String,
}

/// Outcome of normalizing a whole document
#[derive(Debug, Clone)]
pub struct Normalized {
    pub problems: Vec<Problem>,
    pub skipped: Vec<Skipped>,
    pub duplicates_removed: usize,
}

/// Normalize all candidates of one document, preserving source order
///
/// Identical consecutive candidates collapse to one. Malformed candidates
/// are skipped and reported. Fails with `EmptyDocument` if nothing
/// survives.
pub fn normalize_all(candidates: &[RawCandidate]) -> CoachResult<Normalized> {
    debug!(count = candidates.len(), "normalize_all: called");
    let mut problems: Vec<Problem> = Vec::new();
    let mut skipped = Vec::new();
    let mut duplicates_removed = 0;
    let mut occurrences: HashMap<u32, u32> = HashMap::new();
    let mut previous_key: Option<String> = None;
    let mut last_number = 0;

    for candidate in candidates {
        let key: String = candidate.text.split_whitespace().collect();
        if previous_key.as_deref() == Some(key.as_str()) {
            duplicates_removed += 1;
            continue;
        }
        previous_key = Some(key);

        let fallback = last_number + 1;
        match normalize(candidate, fallback) {
            Ok(mut problem) => {
                last_number = problem.number;
                let seen = occurrences.entry(problem.number).or_insert(0);
                *seen += 1;
                problem.id = ProblemId::for_number(problem.number, *seen);
                problems.push(problem);
            }
            Err(e) => {
                warn!(page = candidate.page, number = ?candidate.number, error = %e, "Skipping malformed problem");
                skipped.push(Skipped {
                    page: candidate.page,
                    number: candidate.number,
                    reason: e.to_string(),
                });
            }
        }
    }

    if problems.is_empty() {
        return Err(CoachError::EmptyDocument);
    }

    Ok(Normalized {
        problems,
        skipped,
        duplicates_removed,
    })
}
