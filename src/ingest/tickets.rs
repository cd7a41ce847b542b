use super::outcome::{OutcomeKind, Pipeline, RunCounts, RunOutcome};
use super::staging::stage_batch;
use super::IngestError;
use crate::config::Config;
use crate::source::{DuckDbTicketSource, TicketSource};
use crate::store::{Bucket, ObjectStorage};
use crate::warehouse::{CopyStatus, CsvFormat, DuckDbWarehouse, Stage, Warehouse};
use chrono::NaiveDateTime;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Highest `created_at` already in `bronze.tickets`, or `None` for an empty sink.
pub async fn resolve_watermark(
    warehouse: &dyn Warehouse,
) -> Result<Option<NaiveDateTime>, IngestError> {
    let watermark = warehouse.max_ticket_created_at().await?;
    match watermark {
        Some(ts) => info!(watermark = %ts, "Last loaded timestamp"),
        None => info!("No existing data, performing full load"),
    }
    Ok(watermark)
}

/// Incremental ticket load:
/// resolve watermark, extract, then stage and copy only when rows exist.
pub struct TicketIngestion<'a> {
    source: &'a dyn TicketSource,
    store: &'a dyn ObjectStorage,
    warehouse: &'a dyn Warehouse,
    staging_key: &'a str,
    format: CsvFormat,
}

impl<'a> TicketIngestion<'a> {
    pub fn new(
        config: &'a Config,
        source: &'a dyn TicketSource,
        store: &'a dyn ObjectStorage,
        warehouse: &'a dyn Warehouse,
    ) -> Self {
        Self {
            source,
            store,
            warehouse,
            staging_key: &config.tickets.staging_key,
            format: CsvFormat::default(),
        }
    }

    pub async fn run(&self) -> Result<RunOutcome, IngestError> {
        let watermark = resolve_watermark(self.warehouse).await?;

        let batch = self.source.extract(watermark).await?;
        let mut counts = RunCounts {
            rows_extracted: batch.len() as u64,
            ..RunCounts::default()
        };

        if batch.is_empty() {
            return Ok(RunOutcome::new(
                Pipeline::Tickets,
                OutcomeKind::UpToDate,
                "Nothing to load, bronze.tickets is already up to date",
            )
            .with_counts(counts));
        }

        stage_batch(self.store, self.staging_key, &batch).await?;
        counts.files = 1;

        let report = self
            .warehouse
            .copy_tickets(Stage {
                store: self.store,
                key: self.staging_key,
                format: self.format.clone(),
            })
            .await?;

        for reject in &report.rejected {
            warn!(line = reject.line, error = %reject.error, "Ticket record not loaded");
        }

        counts.rows_loaded = report.rows_loaded;
        counts.rows_rejected = report.rejected.len() as u64;

        let kind = match report.status {
            CopyStatus::Loaded => OutcomeKind::Loaded,
            CopyStatus::PartiallyLoaded | CopyStatus::LoadFailed => OutcomeKind::PartiallyLoaded,
        };

        Ok(RunOutcome::new(
            Pipeline::Tickets,
            kind,
            format!(
                "Loaded {} of {} new tickets into bronze.tickets",
                report.rows_loaded, report.rows_parsed
            ),
        )
        .with_counts(counts)
        .with_rejected(report.rejected))
    }
}

/// Entry point for the `load-tickets` job.
pub async fn load_tickets(config: &Config) -> Result<RunOutcome, IngestError> {
    let run_id = Uuid::new_v4();
    async {
        let warehouse = DuckDbWarehouse::open(&config.warehouse.path)?;
        warehouse.init_schema().await?;
        let source =
            DuckDbTicketSource::open(&config.tickets.source.path, &config.tickets.source.table)?;
        let store = Bucket::from_url(&config.object_store.url)?;

        TicketIngestion::new(config, &source, &store, &warehouse)
            .run()
            .await
    }
    .instrument(info_span!("load_tickets", %run_id))
    .await
}
