//! Ingestion drivers for the bronze layer.

pub mod logs;
pub mod outcome;
pub mod staging;
pub mod tickets;
pub mod upload;

pub use logs::{load_logs, LogIngestion};
pub use outcome::{OutcomeKind, Pipeline, RunCounts, RunOutcome};
pub use tickets::{load_tickets, resolve_watermark, TicketIngestion};
pub use upload::{upload_logs, UploadSummary};

use crate::source::SourceError;
use crate::store::StoreError;
use crate::warehouse::WarehouseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("'{key}' is not valid UTF-8: {source}")]
    Decode {
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("staging error: {0}")]
    Staging(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
