use super::{SourceError, SourceValue, TicketBatch, TicketSource, CREATED_AT};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info};

fn table_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").ok()
        })
        .as_ref()
}

/// Returns true if `name` is a plain (optionally schema-qualified) identifier.
pub fn is_valid_table_name(name: &str) -> bool {
    table_name_pattern().is_some_and(|re| re.is_match(name))
}

/// Ticket source backed by a DuckDB database.
///
/// The connection lives as long as this value; dropping it closes the
/// connection on every exit path.
pub struct DuckDbTicketSource {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl DuckDbTicketSource {
    pub fn open<P: AsRef<Path>>(path: P, table: &str) -> Result<Self, SourceError> {
        Self::with_connection(Connection::open(path)?, table)
    }

    /// In-memory source (for testing).
    pub fn in_memory(table: &str) -> Result<Self, SourceError> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self, SourceError> {
        if !is_valid_table_name(table) {
            return Err(SourceError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
        })
    }

    /// Run arbitrary SQL against the source database (fixtures, migrations).
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SourceError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| SourceError::Poisoned)?;
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await?
    }
}

#[async_trait]
impl TicketSource for DuckDbTicketSource {
    async fn extract(&self, watermark: Option<NaiveDateTime>) -> Result<TicketBatch, SourceError> {
        let conn = self.conn.clone();
        let table = self.table.clone();

        let batch = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| SourceError::Poisoned)?;

            let base_query = format!("SELECT * FROM {}", table);
            let columns = describe_columns(&conn, &base_query)?;

            let mut rows = Vec::new();
            match watermark {
                Some(watermark) => {
                    if !columns.iter().any(|c| c == CREATED_AT) {
                        return Err(SourceError::MissingColumn(CREATED_AT.to_string()));
                    }
                    // Compared at the microsecond precision the warehouse stores.
                    let mut stmt = conn.prepare(&format!(
                        "{} WHERE CAST({col} AS TIMESTAMP) > make_timestamp(?) ORDER BY {col}",
                        base_query,
                        col = CREATED_AT
                    ))?;
                    let mut result = stmt.query(duckdb::params![watermark
                        .and_utc()
                        .timestamp_micros()])?;
                    while let Some(row) = result.next()? {
                        rows.push(read_row(row, columns.len())?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&base_query)?;
                    let mut result = stmt.query([])?;
                    while let Some(row) = result.next()? {
                        rows.push(read_row(row, columns.len())?);
                    }
                }
            }

            Ok::<_, SourceError>(TicketBatch { columns, rows })
        })
        .await??;

        info!(
            rows = batch.len(),
            columns = batch.columns.len(),
            incremental = watermark.is_some(),
            "Extracted tickets from source"
        );
        Ok(batch)
    }
}

/// Column names of `query`'s result, in result order.
fn describe_columns(conn: &Connection, query: &str) -> Result<Vec<String>, SourceError> {
    let mut stmt = conn.prepare(&format!("DESCRIBE {}", query))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut columns = Vec::new();
    for name in names {
        columns.push(name?);
    }
    debug!(columns = ?columns, "Discovered source columns");
    Ok(columns)
}

fn read_row(row: &duckdb::Row<'_>, width: usize) -> Result<Vec<SourceValue>, SourceError> {
    let mut values = Vec::with_capacity(width);
    for index in 0..width {
        values.push(convert_value(row.get::<_, Value>(index)?));
    }
    Ok(values)
}

fn micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn convert_value(value: Value) -> SourceValue {
    match value {
        Value::Null => SourceValue::Null,
        Value::Boolean(v) => SourceValue::Bool(v),
        Value::TinyInt(v) => SourceValue::Int(v.into()),
        Value::SmallInt(v) => SourceValue::Int(v.into()),
        Value::Int(v) => SourceValue::Int(v.into()),
        Value::BigInt(v) => SourceValue::Int(v),
        Value::UTinyInt(v) => SourceValue::Int(v.into()),
        Value::USmallInt(v) => SourceValue::Int(v.into()),
        Value::UInt(v) => SourceValue::Int(v.into()),
        Value::Float(v) => SourceValue::Float(v.into()),
        Value::Double(v) => SourceValue::Float(v),
        Value::Text(v) => SourceValue::Text(v),
        Value::Timestamp(unit, v) => DateTime::from_timestamp_micros(micros(unit, v))
            .map(|dt| SourceValue::Timestamp(dt.naive_utc()))
            .unwrap_or(SourceValue::Null),
        Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
            .map(SourceValue::Date)
            .unwrap_or(SourceValue::Null),
        Value::Decimal(v) => SourceValue::Text(v.to_string()),
        Value::HugeInt(v) => SourceValue::Text(v.to_string()),
        Value::UBigInt(v) => SourceValue::Text(v.to_string()),
        Value::Enum(v) => SourceValue::Text(v),
        other => SourceValue::Text(format!("{:?}", other)),
    }
}
