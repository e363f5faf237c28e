use std::collections::VecDeque;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::issue::IssueKey;

/// What happened to a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    SubmissionFailed,
    Closed,
    CloseFailed,
    Reconciled,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::SubmissionFailed => "submission_failed",
            EventKind::Closed => "closed",
            EventKind::CloseFailed => "close_failed",
            EventKind::Reconciled => "reconciled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationEvent {
    pub timestamp: DateTime<Utc>,
    pub legacy_id: i64,
    pub event: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_key: Option<IssueKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MigrationEvent {
    pub fn new(legacy_id: i64, event: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            legacy_id,
            event,
            issue_key: None,
            message: None,
        }
    }

    pub fn issue(mut self, key: &IssueKey) -> Self {
        self.issue_key = Some(key.clone());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Per-record outcomes, one JSON object per line. Without a path every event
/// is dropped.
#[derive(Debug, Clone, Default)]
pub struct History {
    path: Option<PathBuf>,
}

impl History {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Losing a history line never fails a migration; it is only logged.
    pub fn record(&self, event: MigrationEvent) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_line(path, &event) {
            warn!(path = %path.display(), legacy_id = event.legacy_id, error = %e, "failed to append migration history");
        }
    }
}

fn write_line(path: &Path, event: &MigrationEvent) -> Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(&line))
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// The last `limit` events, oldest first, optionally for one work order.
/// A missing file is an empty history; malformed lines are skipped.
pub fn read_history(path: &Path, legacy_id: Option<i64>, limit: usize) -> Result<Vec<MigrationEvent>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open history {}", path.display()))
        }
    };

    let mut tail = VecDeque::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read history {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: MigrationEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping malformed history line");
                continue;
            }
        };
        if legacy_id.is_some_and(|id| id != event.legacy_id) {
            continue;
        }
        if tail.len() == limit {
            tail.pop_front();
        }
        tail.push_back(event);
    }
    Ok(tail.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> IssueKey {
        IssueKey::from(s)
    }

    #[test]
    fn records_are_read_back_oldest_first_within_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.jsonl");
        let history = History::new(Some(path.clone()));

        history.record(MigrationEvent::new(1, EventKind::Created).issue(&key("SUP-1")));
        history.record(MigrationEvent::new(2, EventKind::SubmissionFailed).message("400 Bad Request"));
        history.record(MigrationEvent::new(3, EventKind::Created).issue(&key("SUP-2")));

        let all = read_history(&path, None, usize::MAX).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].issue_key, Some(key("SUP-1")));
        assert_eq!(all[1].event, EventKind::SubmissionFailed);
        assert_eq!(all[1].message.as_deref(), Some("400 Bad Request"));

        let last = read_history(&path, None, 2).unwrap();
        assert_eq!(last.iter().map(|e| e.legacy_id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(read_history(&path, None, 0).unwrap().is_empty());
    }

    #[test]
    fn filter_by_work_order_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let history = History::new(Some(path.clone()));
        history.record(MigrationEvent::new(7, EventKind::Created).issue(&key("SUP-7")));
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(b"not json\n{\"legacy_id\":8}\n"))
            .unwrap();
        history.record(MigrationEvent::new(8, EventKind::Closed).issue(&key("SUP-8")));

        let events = read_history(&path, Some(8), 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, EventKind::Closed);
        assert_eq!(events[0].issue_key, Some(key("SUP-8")));
    }

    #[test]
    fn missing_file_is_empty_but_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_history(&dir.path().join("absent.jsonl"), None, 5)
            .unwrap()
            .is_empty());
        // A directory opens on unix but cannot be read as lines.
        assert!(read_history(dir.path(), None, 5).is_err());
    }

    #[test]
    fn disabled_history_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        History::disabled().record(MigrationEvent::new(1, EventKind::Created));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(Some(dir.path().to_path_buf()));
        history.record(MigrationEvent::new(1, EventKind::CloseFailed));
    }

    #[test]
    fn wire_format_uses_snake_case_and_omits_empty_fields() {
        let json = serde_json::to_string(&MigrationEvent::new(5, EventKind::CloseFailed)).unwrap();
        assert!(json.contains("\"event\":\"close_failed\""));
        assert!(!json.contains("issue_key"));
        assert!(!json.contains("message"));
        assert_eq!(format!("{:<8}|", EventKind::Closed), "closed  |");
    }
}
