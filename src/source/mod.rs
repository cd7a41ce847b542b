//! Relational ticket source.

pub mod duckdb;

pub use self::duckdb::DuckDbTicketSource;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("database error: {0}")]
    Database(#[from] ::duckdb::Error),

    #[error("invalid table name '{0}'")]
    InvalidTable(String),

    #[error("source has no '{0}' column")]
    MissingColumn(String),

    #[error("connection lock poisoned")]
    Poisoned,

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Column used for incremental extraction.
pub const CREATED_AT: &str = "created_at";

/// A single cell read from the source, typed as the source reported it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for SourceValue {
    /// Text form used in the staged CSV. Null renders as an empty field.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceValue::Null => Ok(()),
            SourceValue::Bool(v) => write!(f, "{}", v),
            SourceValue::Int(v) => write!(f, "{}", v),
            SourceValue::Float(v) => write!(f, "{}", v),
            SourceValue::Text(v) => f.write_str(v),
            SourceValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            SourceValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Every row extracted in one run plus the column names the source reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SourceValue>>,
}

impl TicketBatch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Read all columns of every ticket with `created_at > watermark`,
    /// ordered by `created_at`. With no watermark the whole table is read.
    async fn extract(&self, watermark: Option<NaiveDateTime>) -> Result<TicketBatch, SourceError>;
}
