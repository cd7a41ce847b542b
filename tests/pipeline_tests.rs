use async_trait::async_trait;
use bytes::Bytes;
use careplus_ingest::config::{parse::parse_config, Config};
use careplus_ingest::ingest::{LogIngestion, OutcomeKind, TicketIngestion};
use careplus_ingest::parser::LogRow;
use careplus_ingest::source::{
    DuckDbTicketSource, SourceError, SourceValue, TicketBatch, TicketSource,
};
use careplus_ingest::store::{Bucket, ListPage, ObjectStorage, StoreError};
use careplus_ingest::warehouse::{
    CopyReport, DuckDbWarehouse, Stage, Warehouse, WarehouseError, TICKET_COLUMNS,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn test_config(page_size: usize) -> Config {
    let yaml = format!(
        r#"
object_store:
  url: memory://
  list_page_size: {page_size}
logs:
  prefix: logs/
  suffix: .log
tickets:
  source:
    path: /unused/support.duckdb
  staging_key: tickets/support_tickets.csv
warehouse:
  path: /unused/warehouse.duckdb
"#
    );
    parse_config(&yaml, "test").unwrap()
}

fn log_block(ticket: &str, minute: u32) -> String {
    format!(
        "2025-07-01 10:{minute:02}:00 [INFO] auth-service - TicketID={ticket} SessionID=S{minute}\n\
         IP=192.168.1.{minute} | ResponseTime=120ms | CPU=12.0% | EventType=login | Error=false\n\
         UserAgent=\"curl/8.0\"\n\
         (unused line)\n\
         TraceID=trace-{ticket}"
    )
}

fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 7, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

async fn warehouse() -> DuckDbWarehouse {
    let warehouse = DuckDbWarehouse::in_memory().unwrap();
    warehouse.init_schema().await.unwrap();
    warehouse
}

/// Delegating store that counts writes.
struct CountingStore {
    inner: Bucket,
    puts: AtomicUsize,
}

#[async_trait]
impl ObjectStorage for CountingStore {
    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StoreError> {
        self.inner.list_page(prefix, start_after, page_size).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, body).await
    }
}

/// Delegating warehouse that counts inserts and copies.
struct CountingWarehouse {
    inner: DuckDbWarehouse,
    inserts: AtomicUsize,
    copies: AtomicUsize,
}

#[async_trait]
impl Warehouse for CountingWarehouse {
    async fn init_schema(&self) -> Result<(), WarehouseError> {
        self.inner.init_schema().await
    }

    async fn count_logs(&self) -> Result<u64, WarehouseError> {
        self.inner.count_logs().await
    }

    async fn insert_logs(&self, rows: &[LogRow]) -> Result<u64, WarehouseError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_logs(rows).await
    }

    async fn max_ticket_created_at(&self) -> Result<Option<NaiveDateTime>, WarehouseError> {
        self.inner.max_ticket_created_at().await
    }

    async fn copy_tickets(&self, stage: Stage<'_>) -> Result<CopyReport, WarehouseError> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.inner.copy_tickets(stage).await
    }
}

/// Source that remembers every watermark it was asked for.
struct RecordingSource {
    inner: DuckDbTicketSource,
    requests: Mutex<Vec<Option<NaiveDateTime>>>,
}

#[async_trait]
impl TicketSource for RecordingSource {
    async fn extract(&self, watermark: Option<NaiveDateTime>) -> Result<TicketBatch, SourceError> {
        self.requests.lock().unwrap().push(watermark);
        self.inner.extract(watermark).await
    }
}

/// Source returning a fixed batch.
struct FixedSource(TicketBatch);

#[async_trait]
impl TicketSource for FixedSource {
    async fn extract(&self, _watermark: Option<NaiveDateTime>) -> Result<TicketBatch, SourceError> {
        Ok(self.0.clone())
    }
}

async fn seeded_source() -> DuckDbTicketSource {
    let source = DuckDbTicketSource::in_memory("support_tickets").unwrap();
    source
        .execute_batch(
            "CREATE TABLE support_tickets (
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
            );
            INSERT INTO support_tickets VALUES
                ('T1', '2025-07-01 08:00:00', NULL, 'ana', 'High', 3, 'billing', 'email', 'Open', NULL),
                ('T2', '2025-07-02 08:00:00', NULL, 'bo', 'Low', 1, 'login', 'chat', 'Open', NULL),
                ('T3', '2025-07-03 08:00:00', '2025-07-03 09:00:00', 'cy', 'Low', 2, 'login', 'phone', 'Resolved', 'thanks');",
        )
        .await
        .unwrap();
    source
}

#[tokio::test]
async fn test_log_load_runs_once() {
    let config = test_config(1000);
    let store = Bucket::from_url("memory://").unwrap();
    let two_blocks = format!("{}\n---\n{}", log_block("T1", 1), log_block("T2", 2));
    store
        .put("logs/support_logs_2025-07-01.log", two_blocks.into_bytes())
        .await
        .unwrap();
    store
        .put("logs/notes.txt", b"not a log".to_vec())
        .await
        .unwrap();

    let warehouse = CountingWarehouse {
        inner: warehouse().await,
        inserts: AtomicUsize::new(0),
        copies: AtomicUsize::new(0),
    };

    let first = LogIngestion::new(&config, &store, &warehouse).run().await.unwrap();
    assert_eq!(first.kind, OutcomeKind::Loaded);
    assert_eq!(first.counts.files, 1);
    assert_eq!(first.counts.rows_loaded, 2);

    let second = LogIngestion::new(&config, &store, &warehouse).run().await.unwrap();
    assert_eq!(second.kind, OutcomeKind::Skipped);
    assert_eq!(second.counts.rows_loaded, 0);

    assert_eq!(warehouse.inserts.load(Ordering::SeqCst), 1);
    assert_eq!(warehouse.inner.count_logs().await.unwrap(), 2);
}

#[tokio::test]
async fn test_log_listing_walks_every_page() {
    let config = test_config(2);
    let store = Bucket::from_url("memory://").unwrap();
    for day in 1..=5 {
        let key = format!("logs/support_logs_2025-07-0{day}.log");
        store
            .put(&key, log_block(&format!("T{day}"), day).into_bytes())
            .await
            .unwrap();
    }
    let warehouse = warehouse().await;

    let outcome = LogIngestion::new(&config, &store, &warehouse).run().await.unwrap();

    assert_eq!(outcome.counts.files, 5);
    assert_eq!(outcome.counts.rows_loaded, 5);
}

#[tokio::test]
async fn test_rejected_blocks_are_counted_not_loaded() {
    let config = test_config(1000);
    let store = Bucket::from_url("memory://").unwrap();
    let content = format!(
        "{}\n---\nonly one line\n---\n{}",
        log_block("T1", 1),
        log_block("T2", 2)
    );
    store
        .put("logs/support_logs_2025-07-01.log", content.into_bytes())
        .await
        .unwrap();
    let warehouse = warehouse().await;

    let outcome = LogIngestion::new(&config, &store, &warehouse).run().await.unwrap();

    assert_eq!(outcome.counts.blocks_rejected, 1);
    assert_eq!(outcome.counts.rows_loaded, 2);
}

#[tokio::test]
async fn test_ticket_watermark_drives_next_extract() {
    let config = test_config(1000);
    let store = Bucket::from_url("memory://").unwrap();
    let warehouse = warehouse().await;
    let source = RecordingSource {
        inner: seeded_source().await,
        requests: Mutex::new(Vec::new()),
    };

    let first = TicketIngestion::new(&config, &source, &store, &warehouse)
        .run()
        .await
        .unwrap();
    assert_eq!(first.kind, OutcomeKind::Loaded);
    assert_eq!(first.counts.rows_loaded, 3);
    assert_eq!(warehouse.count_tickets().await.unwrap(), 3);

    let second = TicketIngestion::new(&config, &source, &store, &warehouse)
        .run()
        .await
        .unwrap();
    assert_eq!(second.kind, OutcomeKind::UpToDate);

    let requests = source.requests.lock().unwrap().clone();
    assert_eq!(requests, vec![None, Some(ts(3, 8))]);
    assert_eq!(warehouse.count_tickets().await.unwrap(), 3);
}

#[tokio::test]
async fn test_empty_extract_skips_stage_and_copy() {
    let config = test_config(1000);
    let store = CountingStore {
        inner: Bucket::from_url("memory://").unwrap(),
        puts: AtomicUsize::new(0),
    };
    let warehouse = CountingWarehouse {
        inner: warehouse().await,
        inserts: AtomicUsize::new(0),
        copies: AtomicUsize::new(0),
    };
    let source = FixedSource(TicketBatch {
        columns: TICKET_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows: Vec::new(),
    });

    let outcome = TicketIngestion::new(&config, &source, &store, &warehouse)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::UpToDate);
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    assert_eq!(warehouse.copies.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bad_ticket_row_is_reported_and_rest_loaded() {
    let config = test_config(1000);
    let store = Bucket::from_url("memory://").unwrap();
    let warehouse = warehouse().await;

    let row = |id: &str, day: u32, interactions: SourceValue| {
        vec![
            SourceValue::Text(id.to_string()),
            SourceValue::Timestamp(ts(day, 8)),
            SourceValue::Null,
            SourceValue::Text("ana".to_string()),
            SourceValue::Text("High".to_string()),
            interactions,
            SourceValue::Text("billing".to_string()),
            SourceValue::Text("email".to_string()),
            SourceValue::Text("Open".to_string()),
            SourceValue::Null,
        ]
    };
    let source = FixedSource(TicketBatch {
        columns: TICKET_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows: vec![
            row("T1", 1, SourceValue::Int(2)),
            row("T2", 2, SourceValue::Text("many".to_string())),
            row("T3", 3, SourceValue::Int(4)),
        ],
    });

    let outcome = TicketIngestion::new(&config, &source, &store, &warehouse)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::PartiallyLoaded);
    assert_eq!(outcome.counts.rows_loaded, 2);
    assert_eq!(outcome.counts.rows_rejected, 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(warehouse.max_ticket_created_at().await.unwrap(), Some(ts(3, 8)));
}

#[tokio::test]
async fn test_nanosecond_tickets_load_once() {
    let config = test_config(1000);
    let store = Bucket::from_url("memory://").unwrap();
    let warehouse = warehouse().await;
    let source = DuckDbTicketSource::in_memory("support_tickets").unwrap();
    source
        .execute_batch(
            "CREATE TABLE support_tickets (
                ticket_id VARCHAR,
                created_at TIMESTAMP_NS,
                resolved_at TIMESTAMP,
                agent VARCHAR,
                priority VARCHAR,
                num_interactions INTEGER,
                issue_cat VARCHAR,
                channel VARCHAR,
                status VARCHAR,
                agent_feedback VARCHAR
            );
            INSERT INTO support_tickets VALUES
                ('T1', '2025-07-01 08:00:00.000000500', NULL, 'ana', 'High', 3,
                 'billing', 'email', 'Open', NULL);",
        )
        .await
        .unwrap();

    let mut kinds = Vec::new();
    for _ in 0..3 {
        let outcome = TicketIngestion::new(&config, &source, &store, &warehouse)
            .run()
            .await
            .unwrap();
        kinds.push(outcome.kind);
    }

    assert_eq!(
        kinds,
        vec![OutcomeKind::Loaded, OutcomeKind::UpToDate, OutcomeKind::UpToDate]
    );
    assert_eq!(warehouse.count_tickets().await.unwrap(), 1);
}
