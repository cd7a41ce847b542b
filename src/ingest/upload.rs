use super::IngestError;
use crate::config::Config;
use crate::store::{Bucket, ObjectStorage};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub failed: usize,
}

/// Upload matching files from `dir` to `<prefix><file name>`, in name order.
///
/// A file that fails to read or upload is reported and skipped.
pub async fn upload_dir(
    store: &dyn ObjectStorage,
    dir: &Path,
    file_prefix: &str,
    suffix: &str,
    key_prefix: &str,
) -> Result<UploadSummary, IngestError> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(file_prefix) && name.ends_with(suffix) {
            names.push(name);
        }
    }
    names.sort();

    let mut summary = UploadSummary::default();
    if names.is_empty() {
        warn!(dir = %dir.display(), "No log files found");
        return Ok(summary);
    }

    info!(files = names.len(), "Starting upload");

    for name in names {
        let key = format!("{}{}", key_prefix, name);
        let result = match tokio::fs::read(dir.join(&name)).await {
            Ok(body) => store.put(&key, body).await.map_err(IngestError::from),
            Err(e) => Err(IngestError::from(e)),
        };

        match result {
            Ok(()) => {
                info!(file = %name, key = %key, "Uploaded");
                summary.uploaded += 1;
            }
            Err(e) => {
                error!(file = %name, error = %e, "Upload failed");
                summary.failed += 1;
            }
        }
    }

    info!(uploaded = summary.uploaded, failed = summary.failed, "Upload complete");
    Ok(summary)
}

/// Entry point for the `upload-logs` job.
pub async fn upload_logs(config: &Config) -> Result<UploadSummary, IngestError> {
    let Some(dir) = config.logs.local_dir.as_deref() else {
        warn!("logs.local_dir is not configured, nothing to upload");
        return Ok(UploadSummary::default());
    };

    let store = Bucket::from_url(&config.object_store.url)?;
    upload_dir(
        &store,
        dir,
        &config.logs.local_file_prefix,
        &config.logs.suffix,
        &config.logs.prefix,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_filters_and_orders() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in [
            "support_logs_2025-07-02.log",
            "support_logs_2025-07-01.log",
            "other_2025-07-01.log",
            "support_logs_notes.txt",
        ] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }

        let store = Bucket::from_url("memory://").unwrap();
        let summary = upload_dir(&store, dir.path(), "support_logs_", ".log", "logs/")
            .await
            .unwrap();

        assert_eq!(summary, UploadSummary { uploaded: 2, failed: 0 });
        let page = store.list_page("logs/", None, 10).await.unwrap();
        assert_eq!(
            page.keys,
            vec![
                "logs/support_logs_2025-07-01.log",
                "logs/support_logs_2025-07-02.log"
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_empty_dir_is_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Bucket::from_url("memory://").unwrap();
        let summary = upload_dir(&store, dir.path(), "", ".log", "logs/")
            .await
            .unwrap();
        assert_eq!(summary, UploadSummary::default());
    }
}
