//! Worksheet progress
//!
//! [`summarize`] folds problem statuses into a [`ProgressSummary`]. It is
//! recomputed on every request from live session snapshots.

use serde::Serialize;
use tracing::debug;

use crate::domain::{ProblemStatus, WorksheetId};

/// Counts per status across one worksheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub worksheet_id: WorksheetId,
    pub total: usize,
    pub unstarted: usize,
    pub in_progress: usize,
    pub solved: usize,
    pub abandoned: usize,
}

impl ProgressSummary {
    /// Problems that reached a terminal outcome
    pub fn finished(&self) -> usize {
        self.solved + self.abandoned
    }

    /// Finished / total; 0.0 for an empty worksheet
    pub fn completion_ratio(&self) -> f64 {
        ratio(self.finished(), self.total)
    }

    /// Solved / total; 0.0 for an empty worksheet
    pub fn solved_ratio(&self) -> f64 {
        ratio(self.solved, self.total)
    }

    pub fn count(&self, status: ProblemStatus) -> usize {
        match status {
            ProblemStatus::Unstarted => self.unstarted,
            ProblemStatus::InProgress => self.in_progress,
            ProblemStatus::Solved => self.solved,
            ProblemStatus::Abandoned => self.abandoned,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.finished() == self.total
    }
}

impl std::fmt::Display for ProgressSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} solved, {} abandoned, {} in progress, {} unstarted ({:.0}% complete)",
            self.solved,
            self.total,
            self.abandoned,
            self.in_progress,
            self.unstarted,
            self.completion_ratio() * 100.0
        )
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 }
}

/// Aggregate problem statuses
pub fn summarize(worksheet_id: &WorksheetId, statuses: impl IntoIterator<Item = ProblemStatus>) -> ProgressSummary {
    debug!(%worksheet_id, "summarize: called");
    let mut summary = ProgressSummary {
        worksheet_id: worksheet_id.clone(),
        total: 0,
        unstarted: 0,
        in_progress: 0,
        solved: 0,
        abandoned: 0,
    };
    for status in statuses {
        summary.total += 1;
        match status {
            ProblemStatus::Unstarted => summary.unstarted += 1,
            ProblemStatus::InProgress => summary.in_progress += 1,
            ProblemStatus::Solved => summary.solved += 1,
            ProblemStatus::Abandoned => summary.abandoned += 1,
        }
    }
    summary
}
