use anyhow::{Context, Result};
use tracing::{error, info, warn};

use super::attachments::{transfer_attachments, AttachmentReport};
use super::Migrator;
use crate::history::{EventKind, MigrationEvent};
use crate::legacy::{moved_to_text, ApiToken, LegacyApi};
use crate::model::issue::{IssueKey, IssuePayload};
use crate::model::outcome::{MigrationOutcome, RunSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub legacy_id: i64,
    pub outcome: MigrationOutcome,
    pub attachments: AttachmentReport,
    pub legacy_closed: bool,
}

impl TransferResult {
    pub fn tally(&self, summary: &mut RunSummary) {
        match self.outcome {
            MigrationOutcome::Created(_) => summary.created += 1,
            MigrationOutcome::FailedSubmission(_) => summary.submission_failures += 1,
            MigrationOutcome::SkippedAlreadyMigrated => {}
        }
        if matches!(self.outcome, MigrationOutcome::Created(_)) && !self.legacy_closed {
            summary.legacy_close_failures += 1;
        }
        summary.attachments_uploaded += self.attachments.uploaded.len();
        summary.attachments_failed += self.attachments.failed.len();
    }
}

/// Leave a link to the new issue on the work order and close it.
/// Returns whether the close went through; failures are only logged since
/// the work order resurfaces as stuck next cycle.
pub async fn annotate_and_close(
    legacy: &dyn LegacyApi,
    token: &ApiToken,
    legacy_id: i64,
    link: &str,
) -> bool {
    let text = moved_to_text(link);
    if let Err(e) = legacy.add_note(token, legacy_id, &text).await {
        warn!(legacy_id, error = %e, "failed to add note to work order");
    }
    match legacy.close_work_order(token, legacy_id, &text).await {
        Ok(message) => {
            info!(legacy_id, %message, "work order closed");
            true
        }
        Err(e) => {
            warn!(legacy_id, error = %e, "work order failed to close");
            false
        }
    }
}

/// Create the issue, move attachments, then annotate and close the work order.
/// Nothing touches Track-It! unless the issue was created.
pub async fn transfer_record(ctx: &Migrator<'_>, payload: &IssuePayload) -> Result<TransferResult> {
    let legacy_id = payload.legacy_id();
    info!(legacy_id, "moving work order to {}", ctx.tracker.name());

    let token = ctx
        .legacy
        .authenticate(&ctx.settings.legacy_username)
        .await
        .with_context(|| format!("Failed to authenticate to Track-It! for work order {legacy_id}"))?;

    let key: IssueKey = match ctx.tracker.create_issue(payload).await {
        Ok(key) => key,
        Err(e) => {
            error!(legacy_id, error = %e, "issue creation failed");
            let reason = e.to_string();
            ctx.history
                .record(MigrationEvent::new(legacy_id, EventKind::SubmissionFailed).message(reason.as_str()));
            return Ok(TransferResult {
                legacy_id,
                outcome: MigrationOutcome::FailedSubmission(reason),
                attachments: AttachmentReport::default(),
                legacy_closed: false,
            });
        }
    };

    let link = ctx.tracker.browse_url(&key);
    info!(legacy_id, issue_key = %key, %link, "migrated");
    ctx.history
        .record(MigrationEvent::new(legacy_id, EventKind::Created).issue(&key));

    let attachments =
        transfer_attachments(ctx.tracker, &ctx.settings.attachment_root, legacy_id, &key).await;

    let legacy_closed = annotate_and_close(ctx.legacy, &token, legacy_id, &link).await;
    let closed = if legacy_closed {
        MigrationEvent::new(legacy_id, EventKind::Closed)
    } else {
        MigrationEvent::new(legacy_id, EventKind::CloseFailed).message("left for reconciliation")
    };
    ctx.history.record(closed.issue(&key));

    Ok(TransferResult {
        legacy_id,
        outcome: MigrationOutcome::Created(key),
        attachments,
        legacy_closed,
    })
}
