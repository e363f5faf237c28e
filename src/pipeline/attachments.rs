use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::model::issue::IssueKey;
use crate::tracker::IssueTracker;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AttachmentReport {
    pub uploaded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Files waiting in `<root>/<legacy_id>/`, sorted by name. A missing
/// directory means the work order has no attachments.
pub async fn attachment_files(root: &Path, legacy_id: i64) -> Result<Vec<PathBuf>> {
    let dir = root.join(legacy_id.to_string());
    match tokio::fs::metadata(&dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(Vec::new()),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to inspect {}", dir.display())),
    }
    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Upload every attachment of `legacy_id` to `key`, one file at a time.
/// Failures are logged per file and never abort the transfer.
pub async fn transfer_attachments(
    tracker: &dyn IssueTracker,
    root: &Path,
    legacy_id: i64,
    key: &IssueKey,
) -> AttachmentReport {
    let mut report = AttachmentReport::default();
    let files = match attachment_files(root, legacy_id).await {
        Ok(files) => files,
        Err(e) => {
            warn!(legacy_id, error = %e, "could not read attachment folder");
            return report;
        }
    };
    if files.is_empty() {
        debug!(legacy_id, "no attachments");
        return report;
    }

    for file in files {
        match tracker.upload_attachment(key, &file).await {
            Ok(_) => {
                debug!(legacy_id, issue_key = %key, file = %file.display(), "attachment uploaded");
                report.uploaded.push(file);
            }
            Err(e) => {
                warn!(legacy_id, issue_key = %key, file = %file.display(), error = %e, "attachment upload failed");
                report.failed.push(file);
            }
        }
    }
    info!(
        legacy_id,
        issue_key = %key,
        uploaded = report.uploaded.len(),
        failed = report.failed.len(),
        "attachments transferred"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_folder_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(attachment_files(dir.path(), 52204).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_file_in_place_of_folder_means_no_attachments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("52204"), b"stray").unwrap();
        assert!(attachment_files(dir.path(), 52204).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lists_files_of_the_work_order_only() {
        let dir = tempfile::tempdir().unwrap();
        let wo = dir.path().join("52204");
        std::fs::create_dir_all(wo.join("nested")).unwrap();
        std::fs::write(wo.join("b.png"), b"png").unwrap();
        std::fs::write(wo.join("a.txt"), b"txt").unwrap();
        std::fs::create_dir_all(dir.path().join("52205")).unwrap();
        std::fs::write(dir.path().join("52205").join("other.txt"), b"x").unwrap();

        let files = attachment_files(dir.path(), 52204).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.png"]);
    }
}
