//! Warehouse sink for the bronze layer.

pub mod copy;
pub mod duckdb;

pub use self::copy::{CopyReport, CopyStatus, CsvFormat, RejectedRecord, TicketRecord};
pub use self::duckdb::DuckDbWarehouse;

use crate::parser::LogRow;
use crate::store::{ObjectStorage, StoreError};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

pub const LOGS_TABLE: &str = "bronze.logs";
pub const TICKETS_TABLE: &str = "bronze.tickets";

/// Columns of `bronze.tickets`, in load order.
pub const TICKET_COLUMNS: [&str; 10] = [
    "ticket_id",
    "created_at",
    "resolved_at",
    "agent",
    "priority",
    "num_interactions",
    "issue_cat",
    "channel",
    "status",
    "agent_feedback",
];

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("database error: {0}")]
    Database(#[from] ::duckdb::Error),

    #[error("stage read failed: {0}")]
    Stage(#[from] StoreError),

    #[error("staged file is not valid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid timestamp stored in warehouse: {0}")]
    InvalidTimestamp(i64),

    #[error("connection lock poisoned")]
    Poisoned,

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A staged object the warehouse can bulk-read from.
pub struct Stage<'a> {
    pub store: &'a dyn ObjectStorage,
    pub key: &'a str,
    pub format: CsvFormat,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create the bronze schema and tables if they do not exist.
    async fn init_schema(&self) -> Result<(), WarehouseError>;

    async fn count_logs(&self) -> Result<u64, WarehouseError>;

    /// Insert every row in one transaction. Returns the number inserted.
    async fn insert_logs(&self, rows: &[LogRow]) -> Result<u64, WarehouseError>;

    /// `MAX(created_at)` of `bronze.tickets`, `None` when the table is empty.
    async fn max_ticket_created_at(&self) -> Result<Option<NaiveDateTime>, WarehouseError>;

    /// Bulk-load the staged CSV into `bronze.tickets`, skipping bad records.
    async fn copy_tickets(&self, stage: Stage<'_>) -> Result<CopyReport, WarehouseError>;
}
