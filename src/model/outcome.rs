use serde::Serialize;

use super::issue::IssueKey;

/// What happened to one candidate work order during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Created(IssueKey),
    SkippedAlreadyMigrated,
    FailedSubmission(String),
}

/// Counters reported at the end of every polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub candidates: usize,
    pub mapping_failures: usize,
    pub created: usize,
    pub submission_failures: usize,
    pub attachments_uploaded: usize,
    pub attachments_failed: usize,
    pub legacy_close_failures: usize,
    pub stuck: usize,
    pub stuck_reconciled: usize,
    pub due_dates_set: usize,
    pub due_dates_skipped: usize,
}
