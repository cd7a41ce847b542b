use super::copy::{decode_tickets, CopyReport, TicketRecord};
use super::{Stage, Warehouse, WarehouseError};
use crate::parser::LogRow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

fn micros(ts: &NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

/// DuckDB implementation of the [`Warehouse`] trait.
///
/// One value is opened per run; dropping it releases the connection,
/// including when the run fails part way.
pub struct DuckDbWarehouse {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbWarehouse {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WarehouseError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory warehouse (for testing)
    pub fn in_memory() -> Result<Self, WarehouseError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn count_tickets(&self) -> Result<u64, WarehouseError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| WarehouseError::Poisoned)?;
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM bronze.tickets", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await?
    }
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    async fn init_schema(&self) -> Result<(), WarehouseError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| WarehouseError::Poisoned)?;

            conn.execute_batch("CREATE SCHEMA IF NOT EXISTS bronze")?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS bronze.logs (
                    timestamp TIMESTAMP,
                    log_level VARCHAR,
                    service VARCHAR,
                    ticket_id VARCHAR,
                    session_id VARCHAR,
                    ip VARCHAR,
                    response_time_ms BIGINT,
                    cpu_percent DOUBLE,
                    event_type VARCHAR,
                    error VARCHAR,
                    user_agent VARCHAR,
                    trace_id VARCHAR
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS bronze.tickets (
                    ticket_id VARCHAR,
                    created_at TIMESTAMP,
                    resolved_at TIMESTAMP,
                    agent VARCHAR,
                    priority VARCHAR,
                    num_interactions INTEGER,
                    issue_cat VARCHAR,
                    channel VARCHAR,
                    status VARCHAR,
                    agent_feedback VARCHAR
                )",
                [],
            )?;

            Ok::<(), WarehouseError>(())
        })
        .await?
    }

    async fn count_logs(&self) -> Result<u64, WarehouseError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| WarehouseError::Poisoned)?;
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM bronze.logs", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await?
    }

    async fn insert_logs(&self, rows: &[LogRow]) -> Result<u64, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.clone();
        let rows = rows.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| WarehouseError::Poisoned)?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO bronze.logs (
                        timestamp, log_level, service, ticket_id, session_id,
                        ip, response_time_ms, cpu_percent, event_type, error,
                        user_agent, trace_id
                    ) VALUES (make_timestamp(?), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )?;

                for row in &rows {
                    stmt.execute(duckdb::params![
                        micros(&row.timestamp),
                        row.log_level,
                        row.service,
                        row.ticket_id,
                        row.session_id,
                        row.ip,
                        row.response_time_ms,
                        row.cpu_percent,
                        row.event_type,
                        row.error,
                        row.user_agent,
                        row.trace_id,
                    ])?;
                }
            }
            tx.commit()?;

            Ok::<u64, WarehouseError>(rows.len() as u64)
        })
        .await?
    }

    async fn max_ticket_created_at(&self) -> Result<Option<NaiveDateTime>, WarehouseError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| WarehouseError::Poisoned)?;
            let max: Option<i64> = conn.query_row(
                "SELECT epoch_us(MAX(created_at)) FROM bronze.tickets",
                [],
                |row| row.get(0),
            )?;

            max.map(|us| {
                DateTime::from_timestamp_micros(us)
                    .map(|dt| dt.naive_utc())
                    .ok_or(WarehouseError::InvalidTimestamp(us))
            })
            .transpose()
        })
        .await?
    }

    async fn copy_tickets(&self, stage: Stage<'_>) -> Result<CopyReport, WarehouseError> {
        let body = stage.store.get(stage.key).await?;
        let (records, rejected) = decode_tickets(&body, &stage.format);

        for reject in &rejected {
            warn!(
                file = stage.key,
                line = reject.line,
                error = %reject.error,
                "Rejected staged record"
            );
        }

        let conn = self.conn.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| WarehouseError::Poisoned)?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO bronze.tickets (
                        ticket_id, created_at, resolved_at, agent,
                        priority, num_interactions, issue_cat,
                        channel, status, agent_feedback
                    ) VALUES (?, make_timestamp(?), make_timestamp(?), ?, ?, ?, ?, ?, ?, ?)",
                )?;

                for record in &records {
                    insert_ticket(&mut stmt, record)?;
                }
            }
            tx.commit()?;

            Ok::<u64, WarehouseError>(records.len() as u64)
        })
        .await??;

        let report = CopyReport::new(stage.key, loaded, rejected);
        info!(
            file = %report.file,
            rows_parsed = report.rows_parsed,
            rows_loaded = report.rows_loaded,
            status = ?report.status,
            "Copied staged tickets"
        );
        Ok(report)
    }
}

fn insert_ticket(
    stmt: &mut duckdb::Statement<'_>,
    record: &TicketRecord,
) -> Result<(), WarehouseError> {
    stmt.execute(duckdb::params![
        record.ticket_id,
        record.created_at.as_ref().map(micros),
        record.resolved_at.as_ref().map(micros),
        record.agent,
        record.priority,
        record.num_interactions,
        record.issue_cat,
        record.channel,
        record.status,
        record.agent_feedback,
    ])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_block;
    use crate::store::{Bucket, ObjectStorage};
    use crate::warehouse::{CopyStatus, CsvFormat};
    use chrono::NaiveDate;

    async fn setup_warehouse() -> DuckDbWarehouse {
        let warehouse = DuckDbWarehouse::in_memory().unwrap();
        warehouse.init_schema().await.unwrap();
        warehouse
    }

    fn sample_row(ticket: &str) -> LogRow {
        parse_block(&format!(
            "2025-07-01 10:15:00 [ERROR] billing-service - TicketID={ticket} SessionID=S55\n\
             IP=10.0.0.5 | ResponseTime=-1ms | CPU=87.5% | EventType=timeout | Error=true\n\
             UserAgent=\"Mozilla/5.0\"\n\
             (unused line)\n\
             TraceID=abc123"
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_schema_initialization_is_idempotent() {
        let warehouse = setup_warehouse().await;
        assert!(warehouse.init_schema().await.is_ok());
        assert_eq!(warehouse.count_logs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_and_count_logs() {
        let warehouse = setup_warehouse().await;
        let mut second = sample_row("T2");
        second.user_agent = None;

        let inserted = warehouse
            .insert_logs(&[sample_row("T1"), second])
            .await
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(warehouse.count_logs().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_empty_is_noop() {
        let warehouse = setup_warehouse().await;
        assert_eq!(warehouse.insert_logs(&[]).await.unwrap(), 0);
        assert_eq!(warehouse.count_logs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_max_created_at_empty_is_none() {
        let warehouse = setup_warehouse().await;
        assert_eq!(warehouse.max_ticket_created_at().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_copy_tickets_loads_good_rows_and_reports_bad() {
        let warehouse = setup_warehouse().await;
        let bucket = Bucket::from_url("memory://").unwrap();
        bucket
            .put(
                "tickets/support_tickets.csv",
                b"ticket_id,created_at,resolved_at,agent,priority,num_interactions,issue_cat,channel,status,agent_feedback\n\
                  T1,2025-07-01 08:00:00,,ana,High,3,billing,email,Open,\n\
                  T2,not-a-date,,bo,Low,1,login,chat,Open,\n\
                  T3,2025-07-03 12:30:00,2025-07-03 13:00:00,cy,Low,2,login,chat,Resolved,great\n"
                    .to_vec(),
            )
            .await
            .unwrap();

        let report = warehouse
            .copy_tickets(Stage {
                store: &bucket,
                key: "tickets/support_tickets.csv",
                format: CsvFormat::default(),
            })
            .await
            .unwrap();

        assert_eq!(report.rows_loaded, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 3);
        assert_eq!(report.status, CopyStatus::PartiallyLoaded);
        assert_eq!(warehouse.count_tickets().await.unwrap(), 2);

        let expected = NaiveDate::from_ymd_opt(2025, 7, 3)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(
            warehouse.max_ticket_created_at().await.unwrap(),
            Some(expected)
        );
    }
}
