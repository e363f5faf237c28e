use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::{debug, info, warn};

use crate::error::{DueDateError, TrackerError};
use crate::model::issue::{DueDateTask, IssueKey, IssueType};
use crate::tracker::{search_all, IssueTracker, SearchIssue, SearchQuery};

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advance `start` by `days` business days, skipping Saturdays and Sundays.
/// A weekend start with zero days rolls forward to Monday.
pub fn add_business_days(start: NaiveDate, days: u32) -> NaiveDate {
    let mut date = start;
    let mut remaining = days;
    while remaining > 0 {
        date = date + Days::new(1);
        if !is_weekend(date) {
            remaining -= 1;
        }
    }
    while is_weekend(date) {
        date = date + Days::new(1);
    }
    date
}

pub fn resolve_due_date(
    created: NaiveDate,
    priority: &str,
    offsets: &HashMap<String, u32>,
) -> Result<NaiveDate, DueDateError> {
    let days = offsets
        .get(priority)
        .ok_or_else(|| DueDateError::UnknownPriority(priority.to_string()))?;
    Ok(add_business_days(created, *days))
}

/// `created` arrives as e.g. `2024-01-05T10:00:00.000+0000`; only the date counts.
pub fn parse_created(raw: &str) -> Result<NaiveDate, DueDateError> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| DueDateError::InvalidCreated(raw.to_string()))
}

pub fn missing_due_date_jql(project_key: &str) -> String {
    format!(
        "project = \"{project_key}\" AND duedate is EMPTY AND type = \"{}\"",
        IssueType::IncidentManagement
    )
}

fn to_task(issue: SearchIssue) -> Result<DueDateTask, (IssueKey, DueDateError)> {
    let key = IssueKey(issue.key);
    let raw = issue.fields.created.unwrap_or_default();
    match parse_created(&raw) {
        Ok(created) => Ok(DueDateTask {
            key,
            priority: issue.fields.priority.map(|p| p.name),
            created,
        }),
        Err(e) => Err((key, e)),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub set: usize,
    pub skipped: usize,
}

/// Backfill due dates on every Incident Management issue of the project
/// that has none, not only on issues created this cycle.
pub async fn sweep_due_dates(
    tracker: &dyn IssueTracker,
    project_key: &str,
    offsets: &HashMap<String, u32>,
    page_size: u32,
) -> Result<SweepReport, TrackerError> {
    let query = SearchQuery::new(missing_due_date_jql(project_key), &["priority", "created"], page_size);
    let issues = search_all(tracker, query).await?;
    debug!(count = issues.len(), "issues without due date");

    let mut report = SweepReport::default();
    for issue in issues {
        let task = match to_task(issue) {
            Ok(task) => task,
            Err((key, e)) => {
                warn!(issue_key = %key, error = %e, "skipping due date");
                report.skipped += 1;
                continue;
            }
        };

        let due = match task.priority.as_deref() {
            Some(priority) => resolve_due_date(task.created, priority, offsets),
            None => Err(DueDateError::MissingPriority),
        };
        let due = match due {
            Ok(due) => due,
            Err(e) => {
                warn!(issue_key = %task.key, error = %e, "skipping due date");
                report.skipped += 1;
                continue;
            }
        };

        let fields = serde_json::json!({ "duedate": due.format("%Y-%m-%d").to_string() });
        match tracker.update_issue(&task.key, fields).await {
            Ok(()) => {
                info!(issue_key = %task.key, due_date = %due, "due date set");
                report.set += 1;
            }
            Err(e) => {
                warn!(issue_key = %task.key, error = %e, "failed to set due date");
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}
