use super::outcome::{OutcomeKind, Pipeline, RunCounts, RunOutcome};
use super::IngestError;
use crate::config::Config;
use crate::parser::{parse_file, LogRow};
use crate::store::{Bucket, ObjectStorage};
use crate::warehouse::{DuckDbWarehouse, Warehouse};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Rows gathered from every matching file under the log prefix.
#[derive(Debug, Default)]
pub struct CollectedLogs {
    pub rows: Vec<LogRow>,
    pub files: usize,
    pub blocks_rejected: u64,
}

/// Log ingestion: enumerate, parse, then load once behind the row-count gate.
pub struct LogIngestion<'a> {
    store: &'a dyn ObjectStorage,
    warehouse: &'a dyn Warehouse,
    prefix: &'a str,
    suffix: &'a str,
    page_size: usize,
}

impl<'a> LogIngestion<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a dyn ObjectStorage,
        warehouse: &'a dyn Warehouse,
    ) -> Self {
        Self {
            store,
            warehouse,
            prefix: &config.logs.prefix,
            suffix: &config.logs.suffix,
            page_size: config.object_store.list_page_size,
        }
    }

    /// Walk every listing page and parse each log file found.
    pub async fn collect(&self) -> Result<CollectedLogs, IngestError> {
        let mut collected = CollectedLogs::default();
        let mut start_after: Option<String> = None;

        info!(prefix = self.prefix, "Fetching log files");

        loop {
            let page = self
                .store
                .list_page(self.prefix, start_after.as_deref(), self.page_size)
                .await?;

            for key in page.keys.iter().filter(|k| k.ends_with(self.suffix)) {
                let file = key.rsplit('/').next().unwrap_or(key.as_str());
                info!(file, "Parsing log file");

                let body = self.store.get(key).await?;
                let content =
                    String::from_utf8(body.to_vec()).map_err(|source| IngestError::Decode {
                        key: key.clone(),
                        source,
                    })?;

                let parsed = parse_file(&content);
                let file_rows = parsed.rows.len();
                collected.files += 1;
                collected.blocks_rejected += parsed.rejected as u64;
                collected.rows.extend(parsed.rows);

                info!(
                    file,
                    rows = file_rows,
                    rejected = parsed.rejected,
                    total_rows = collected.rows.len(),
                    "Parsed log file"
                );
            }

            match page.next_start_after {
                Some(next) => start_after = Some(next),
                None => break,
            }
        }

        info!(
            files = collected.files,
            total_rows = collected.rows.len(),
            blocks_rejected = collected.blocks_rejected,
            "Parsed all log files"
        );
        Ok(collected)
    }

    pub async fn run(&self) -> Result<RunOutcome, IngestError> {
        let collected = self.collect().await?;
        let mut counts = RunCounts {
            files: collected.files,
            rows_extracted: collected.rows.len() as u64,
            blocks_rejected: collected.blocks_rejected,
            ..RunCounts::default()
        };

        // One-time backfill: any existing row means the load already happened.
        let existing = self.warehouse.count_logs().await?;
        if existing > 0 {
            return Ok(RunOutcome::new(
                Pipeline::Logs,
                OutcomeKind::Skipped,
                format!(
                    "Skipping logs load, {} rows already exist in bronze.logs",
                    existing
                ),
            )
            .with_counts(counts));
        }

        info!(rows = collected.rows.len(), "Loading into bronze.logs");
        counts.rows_loaded = self.warehouse.insert_logs(&collected.rows).await?;

        Ok(RunOutcome::new(
            Pipeline::Logs,
            OutcomeKind::Loaded,
            format!("Loaded {} rows into bronze.logs", counts.rows_loaded),
        )
        .with_counts(counts))
    }
}

/// Entry point for the `load-logs` job.
pub async fn load_logs(config: &Config) -> Result<RunOutcome, IngestError> {
    let run_id = Uuid::new_v4();
    async {
        let store = Bucket::from_url(&config.object_store.url)?;
        let warehouse = DuckDbWarehouse::open(&config.warehouse.path)?;
        warehouse.init_schema().await?;

        LogIngestion::new(config, &store, &warehouse).run().await
    }
    .instrument(info_span!("load_logs", %run_id))
    .await
}
