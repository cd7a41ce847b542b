//! Ticket staging: a full rewrite of one fixed object per run.

use super::IngestError;
use crate::source::TicketBatch;
use crate::store::ObjectStorage;
use tracing::info;

/// Render a batch as CSV: header row of source column names, then one
/// record per row. Nulls become empty fields.
pub fn encode_batch(batch: &TicketBatch) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&batch.columns)?;
    for row in &batch.rows {
        writer.write_record(row.iter().map(|value| value.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Overwrite `key` with the encoded batch.
pub async fn stage_batch(
    store: &dyn ObjectStorage,
    key: &str,
    batch: &TicketBatch,
) -> Result<(), IngestError> {
    let body = encode_batch(batch)?;
    let bytes = body.len();
    store.put(key, body).await?;
    info!(key, rows = batch.len(), bytes, "Staged tickets");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceValue;
    use chrono::NaiveDate;

    #[test]
    fn test_encode_header_nulls_and_quoting() {
        let created = NaiveDate::from_ymd_opt(2025, 7, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let batch = TicketBatch {
            columns: vec![
                "ticket_id".to_string(),
                "created_at".to_string(),
                "agent_feedback".to_string(),
            ],
            rows: vec![
                vec![
                    SourceValue::Text("T1".to_string()),
                    SourceValue::Timestamp(created),
                    SourceValue::Null,
                ],
                vec![
                    SourceValue::Text("T2".to_string()),
                    SourceValue::Timestamp(created),
                    SourceValue::Text("slow, but \"fine\"".to_string()),
                ],
            ],
        };

        let body = String::from_utf8(encode_batch(&batch).unwrap()).unwrap();
        assert_eq!(
            body,
            "ticket_id,created_at,agent_feedback\n\
             T1,2025-07-01 08:00:00,\n\
             T2,2025-07-01 08:00:00,\"slow, but \"\"fine\"\"\"\n"
        );
    }
}
