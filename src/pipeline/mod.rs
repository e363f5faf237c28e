pub mod attachments;
pub mod detector;
pub mod due_date;
pub mod mapper;
pub mod reconcile;
pub mod transfer;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::history::History;
use crate::legacy::{LegacyApi, WorkOrderSource};
use crate::model::issue::IssuePayload;
use crate::model::outcome::{MigrationOutcome, RunSummary};
use crate::model::work_order::LegacyWorkOrder;
use crate::tracker::{fetch_cross_references, IssueTracker};
use mapper::{map_work_order, MappingRules};

/// Everything one cycle needs from the configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_key: String,
    pub page_size: u32,
    pub legacy_username: String,
    pub attachment_root: PathBuf,
    pub due_date_days: HashMap<String, u32>,
    pub rules: MappingRules,
}

impl From<&AppConfig> for Settings {
    fn from(config: &AppConfig) -> Self {
        Self {
            project_key: config.jira.project_key.clone(),
            page_size: config.jira.page_size,
            legacy_username: config.trackit.api_username.clone(),
            attachment_root: config.attachment_folder.clone(),
            due_date_days: config.due_date_days.clone(),
            rules: MappingRules::from(&config.jira),
        }
    }
}

/// Result of one full pass over the pipeline.
#[derive(Debug, Default, Clone)]
pub struct CycleReport {
    pub summary: RunSummary,
    pub outcomes: Vec<(i64, MigrationOutcome)>,
}

pub struct Migrator<'a> {
    settings: Settings,
    source: &'a dyn WorkOrderSource,
    tracker: &'a dyn IssueTracker,
    legacy: &'a dyn LegacyApi,
    history: History,
}

impl<'a> Migrator<'a> {
    pub fn new(
        settings: Settings,
        source: &'a dyn WorkOrderSource,
        tracker: &'a dyn IssueTracker,
        legacy: &'a dyn LegacyApi,
    ) -> Self {
        Self {
            settings,
            source,
            tracker,
            legacy,
            history: History::disabled(),
        }
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    /// Detector, orchestrator, reconciler, then the due-date sweep.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let orders = self
            .source
            .fetch_open()
            .await
            .context("Failed to fetch open work orders")?;
        info!(count = orders.len(), "open work orders");

        let mut report = CycleReport::default();
        let candidates = self.map_candidates(&orders, &mut report.summary);
        report.summary.candidates = candidates.len();

        let existing: HashSet<i64> = fetch_cross_references(
            self.tracker,
            &self.settings.project_key,
            self.settings.page_size,
        )
        .await
        .with_context(|| format!("Failed to list {} issues", self.tracker.name()))?
        .into_iter()
        .collect();

        let ids: Vec<i64> = candidates.iter().map(IssuePayload::legacy_id).collect();
        let state = detector::partition(&ids, &existing);
        report.summary.stuck = state.stuck.len();
        info!(pending = state.pending.len(), stuck = state.stuck.len(), "migration state");

        let pending: Vec<&IssuePayload> = state
            .pending
            .iter()
            .filter_map(|id| candidates.iter().find(|p| p.legacy_id() == *id))
            .collect();
        for payload in pending {
            let result = transfer::transfer_record(self, payload).await?;
            result.tally(&mut report.summary);
            report.outcomes.push((result.legacy_id, result.outcome));
        }

        for &legacy_id in &state.stuck {
            if reconcile::reconcile_stuck(self, legacy_id).await? {
                report.summary.stuck_reconciled += 1;
            }
            report
                .outcomes
                .push((legacy_id, MigrationOutcome::SkippedAlreadyMigrated));
        }

        let sweep = due_date::sweep_due_dates(
            self.tracker,
            &self.settings.project_key,
            &self.settings.due_date_days,
            self.settings.page_size,
        )
        .await
        .context("Failed to sweep missing due dates")?;
        report.summary.due_dates_set = sweep.set;
        report.summary.due_dates_skipped = sweep.skipped;

        info!(summary = ?report.summary, "cycle finished");
        Ok(report)
    }

    fn map_candidates(&self, orders: &[LegacyWorkOrder], summary: &mut RunSummary) -> Vec<IssuePayload> {
        orders
            .iter()
            .filter_map(|order| {
                match map_work_order(order, &self.settings.project_key, &self.settings.rules) {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!(legacy_id = %order.id, error = %e, "skipping unmappable work order");
                        summary.mapping_failures += 1;
                        None
                    }
                }
            })
            .collect()
    }
}
