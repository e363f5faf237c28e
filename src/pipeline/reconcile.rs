use anyhow::{Context, Result};
use tracing::{info, warn};

use super::transfer::annotate_and_close;
use super::Migrator;
use crate::history::{EventKind, MigrationEvent};
use crate::tracker::find_by_legacy_id;

/// Close a work order whose issue was created in an earlier cycle.
/// Returns whether the work order is now closed.
pub async fn reconcile_stuck(ctx: &Migrator<'_>, legacy_id: i64) -> Result<bool> {
    let token = ctx
        .legacy
        .authenticate(&ctx.settings.legacy_username)
        .await
        .with_context(|| format!("Failed to authenticate to Track-It! for work order {legacy_id}"))?;

    let key = match find_by_legacy_id(ctx.tracker, legacy_id).await {
        Ok(Some(key)) => key,
        Ok(None) => {
            warn!(legacy_id, "no issue found for stuck work order");
            return Ok(false);
        }
        Err(e) => {
            warn!(legacy_id, error = %e, "lookup of stuck work order failed");
            return Ok(false);
        }
    };

    let link = ctx.tracker.browse_url(&key);
    info!(legacy_id, issue_key = %key, "retrying close of previously migrated work order");
    let closed = annotate_and_close(ctx.legacy, &token, legacy_id, &link).await;
    let kind = if closed {
        EventKind::Reconciled
    } else {
        EventKind::CloseFailed
    };
    ctx.history.record(MigrationEvent::new(legacy_id, kind).issue(&key));
    Ok(closed)
}
