//! CSV framing for stage loads.
//!
//! Mirrors a warehouse `COPY INTO ... FILE_FORMAT = (TYPE = CSV ...)
//! ON_ERROR = CONTINUE`: records that cannot be typed are skipped and
//! reported, the rest are loaded.

use super::TICKET_COLUMNS;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// CSV file format of a stage.
#[derive(Debug, Clone)]
pub struct CsvFormat {
    pub delimiter: u8,
    /// Character fields may optionally be enclosed in.
    pub quote: u8,
    pub skip_header: usize,
    /// Field values loaded as SQL NULL.
    pub null_if: Vec<String>,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            skip_header: 1,
            null_if: vec!["NULL".to_string(), "null".to_string(), String::new()],
        }
    }
}

/// One `bronze.tickets` row, typed.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRecord {
    pub ticket_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub resolved_at: Option<NaiveDateTime>,
    pub agent: Option<String>,
    pub priority: Option<String>,
    pub num_interactions: Option<i32>,
    pub issue_cat: Option<String>,
    pub channel: Option<String>,
    pub status: Option<String>,
    pub agent_feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    /// 1-based line of the record in the staged file.
    pub line: u64,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CopyStatus {
    Loaded,
    PartiallyLoaded,
    LoadFailed,
}

/// Result of one stage load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    pub file: String,
    pub rows_parsed: u64,
    pub rows_loaded: u64,
    pub rejected: Vec<RejectedRecord>,
    pub status: CopyStatus,
}

impl CopyReport {
    pub fn new(file: &str, rows_loaded: u64, rejected: Vec<RejectedRecord>) -> Self {
        let status = match (rows_loaded, rejected.is_empty()) {
            (_, true) => CopyStatus::Loaded,
            (0, false) => CopyStatus::LoadFailed,
            _ => CopyStatus::PartiallyLoaded,
        };
        Self {
            file: file.to_string(),
            rows_parsed: rows_loaded + rejected.len() as u64,
            rows_loaded,
            rejected,
            status,
        }
    }
}

/// Decode the staged bytes into typed records and rejections, in file order.
pub fn decode_tickets(
    body: &[u8],
    format: &CsvFormat,
) -> (Vec<TicketRecord>, Vec<RejectedRecord>) {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(format.delimiter)
        .quote(format.quote)
        .from_reader(body);

    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for (index, result) in reader.records().enumerate().skip(format.skip_header) {
        let fallback_line = index as u64 + 1;
        match result {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                let fields: Vec<&str> = record.iter().collect();
                match TicketRecord::from_fields(&fields, &format.null_if) {
                    Ok(ticket) => records.push(ticket),
                    Err(error) => rejected.push(RejectedRecord { line, error }),
                }
            }
            Err(e) => rejected.push(RejectedRecord {
                line: e.position().map(|p| p.line()).unwrap_or(fallback_line),
                error: e.to_string(),
            }),
        }
    }

    (records, rejected)
}

impl TicketRecord {
    /// Type one CSV record. Fields are matched to columns by position.
    pub fn from_fields(fields: &[&str], null_if: &[String]) -> Result<Self, String> {
        if fields.len() != TICKET_COLUMNS.len() {
            return Err(format!(
                "number of columns in file ({}) does not match that of the table ({})",
                fields.len(),
                TICKET_COLUMNS.len()
            ));
        }

        let value = |index: usize| -> Option<String> {
            let raw = fields[index];
            if null_if.iter().any(|n| n == raw) {
                None
            } else {
                Some(raw.to_string())
            }
        };

        let timestamp = |index: usize| -> Result<Option<NaiveDateTime>, String> {
            value(index)
                .map(|raw| {
                    parse_timestamp(&raw).ok_or_else(|| {
                        format!(
                            "timestamp '{}' is not recognized for column {}",
                            raw, TICKET_COLUMNS[index]
                        )
                    })
                })
                .transpose()
        };

        let num_interactions = value(5)
            .map(|raw| {
                raw.trim().parse::<i32>().map_err(|_| {
                    format!(
                        "numeric value '{}' is not recognized for column {}",
                        raw, TICKET_COLUMNS[5]
                    )
                })
            })
            .transpose()?;

        Ok(Self {
            ticket_id: value(0),
            created_at: timestamp(1)?,
            resolved_at: timestamp(2)?,
            agent: value(3),
            priority: value(4),
            num_interactions,
            issue_cat: value(6),
            channel: value(7),
            status: value(8),
            agent_feedback: value(9),
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
