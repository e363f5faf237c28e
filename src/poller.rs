use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info};

use crate::error::{DueDateError, LegacyApiError, MappingError, TrackerError};
use crate::pipeline::{CycleReport, Migrator};

/// Causes written to the diagnostics file after the top-level message.
const MAX_CAUSES: usize = 3;
/// Backtrace lines kept when one was captured (`RUST_BACKTRACE=1`).
const MAX_BACKTRACE_LINES: usize = 16;

/// Why a whole cycle was abandoned.
#[derive(Debug)]
pub enum CycleFailure {
    Error(anyhow::Error),
    Panic(String),
}

impl CycleFailure {
    fn kind(&self) -> &'static str {
        match self {
            CycleFailure::Error(e) => error_kind(e),
            CycleFailure::Panic(_) => "panic",
        }
    }

    fn message(&self) -> String {
        match self {
            CycleFailure::Error(e) => e.to_string(),
            CycleFailure::Panic(msg) => msg.clone(),
        }
    }

    /// Render the dump: timestamp, kind, message and a bounded cause chain.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} cycle failed", chrono::Utc::now().to_rfc3339());
        let _ = writeln!(out, "kind: {}", self.kind());
        let _ = writeln!(out, "message: {}", self.message());
        if let CycleFailure::Error(e) = self {
            for cause in e.chain().skip(1).take(MAX_CAUSES) {
                let _ = writeln!(out, "caused by: {cause}");
            }
            let backtrace = e.backtrace();
            if backtrace.status() == BacktraceStatus::Captured {
                let _ = writeln!(out, "backtrace:");
                for line in backtrace.to_string().lines().take(MAX_BACKTRACE_LINES) {
                    let _ = writeln!(out, "  {line}");
                }
            }
        }
        out
    }
}

/// Name of the outermost typed error in the chain.
fn error_kind(e: &anyhow::Error) -> &'static str {
    for cause in e.chain() {
        if cause.is::<TrackerError>() {
            return "TrackerError";
        }
        if cause.is::<LegacyApiError>() {
            return "LegacyApiError";
        }
        if cause.is::<MappingError>() {
            return "MappingError";
        }
        if cause.is::<DueDateError>() {
            return "DueDateError";
        }
        if cause.is::<rusqlite::Error>() {
            return "DatabaseError";
        }
        if cause.is::<reqwest::Error>() {
            return "HttpError";
        }
        if cause.is::<std::io::Error>() {
            return "IoError";
        }
    }
    "error"
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Overwrite the diagnostics file with the latest failure.
pub fn write_diagnostics(path: &Path, failure: &CycleFailure) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(path, failure.render()) {
        error!(path = %path.display(), error = %e, "failed to write diagnostics file");
    }
}

/// Runs the pipeline on a fixed interval; a failed cycle is dumped and the
/// loop carries on.
pub struct Poller<'a> {
    migrator: Migrator<'a>,
    interval: Duration,
    diagnostics_file: PathBuf,
}

impl<'a> Poller<'a> {
    pub fn new(migrator: Migrator<'a>, interval: Duration, diagnostics_file: PathBuf) -> Self {
        Self {
            migrator,
            interval,
            diagnostics_file,
        }
    }

    /// One guarded cycle. Errors and panics are logged and dumped before being
    /// handed back.
    pub async fn run_guarded(&self) -> Result<CycleReport, CycleFailure> {
        let failure = match AssertUnwindSafe(self.migrator.run_cycle())
            .catch_unwind()
            .await
        {
            Ok(Ok(report)) => return Ok(report),
            Ok(Err(e)) => CycleFailure::Error(e),
            Err(payload) => CycleFailure::Panic(panic_message(payload.as_ref())),
        };
        error!(
            kind = failure.kind(),
            error = %failure.message(),
            diagnostics = %self.diagnostics_file.display(),
            "cycle failed, see diagnostics file"
        );
        write_diagnostics(&self.diagnostics_file, &failure);
        Err(failure)
    }

    /// Loop forever, or for `cycles` iterations when given.
    pub async fn run(&self, cycles: Option<u64>) {
        let mut completed = 0u64;
        loop {
            let _ = self.run_guarded().await;
            completed += 1;
            if cycles.is_some_and(|max| completed >= max) {
                break;
            }
            info!(seconds = self.interval.as_secs(), "sleeping until next cycle");
            tokio::time::sleep(self.interval).await;
        }
    }
}
