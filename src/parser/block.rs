use super::grammar::{
    grammar, HEADER_LINE, METRICS_LINE, MIN_BLOCK_LINES, TIMESTAMP_FORMAT, TRACE_LINE,
    USER_AGENT_LINE,
};
use chrono::NaiveDateTime;
use regex::Captures;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One decoded log event, column-for-column with `bronze.logs`.
///
/// Field values are kept exactly as they appear in the source text apart
/// from the numeric and timestamp coercions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub timestamp: NaiveDateTime,
    pub log_level: String,
    pub service: String,
    pub ticket_id: String,
    pub session_id: String,
    pub ip: String,
    pub response_time_ms: i64,
    pub cpu_percent: f64,
    pub event_type: String,
    pub error: String,
    pub user_agent: Option<String>,
    pub trace_id: Option<String>,
}

/// Reason a block produced no row.
#[derive(Debug, Clone, Error)]
pub enum BlockRejection {
    #[error("block has {found} non-empty lines, at least {} required", MIN_BLOCK_LINES)]
    TooFewLines { found: usize },

    #[error("header line does not match: {line}")]
    HeaderMismatch { line: String },

    #[error("metrics line does not match: {line}")]
    MetricsMismatch { line: String },

    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid response time '{value}': {source}")]
    InvalidResponseTime {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("invalid cpu percentage '{value}': {source}")]
    InvalidCpu {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("grammar unavailable: {0}")]
    Grammar(#[from] regex::Error),
}

/// Decode one block of text into a [`LogRow`].
///
/// Pure function: the same text always yields the same result.
pub fn parse_block(block: &str) -> Result<LogRow, BlockRejection> {
    let grammar = grammar()?;

    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < MIN_BLOCK_LINES {
        return Err(BlockRejection::TooFewLines { found: lines.len() });
    }

    let header = grammar
        .header
        .captures(lines[HEADER_LINE])
        .ok_or_else(|| BlockRejection::HeaderMismatch {
            line: lines[HEADER_LINE].to_string(),
        })?;

    let ts = &header["ts"];
    let timestamp = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).map_err(|source| {
        BlockRejection::InvalidTimestamp {
            value: ts.to_string(),
            source,
        }
    })?;

    let metrics = grammar
        .metrics
        .captures(lines[METRICS_LINE])
        .ok_or_else(|| BlockRejection::MetricsMismatch {
            line: lines[METRICS_LINE].to_string(),
        })?;

    let response = &metrics["response_ms"];
    let response_time_ms: i64 =
        response
            .parse()
            .map_err(|source| BlockRejection::InvalidResponseTime {
                value: response.to_string(),
                source,
            })?;

    let cpu = &metrics["cpu"];
    let cpu_percent: f64 = cpu.parse().map_err(|source| BlockRejection::InvalidCpu {
        value: cpu.to_string(),
        source,
    })?;

    let user_agent = optional_group(
        grammar.user_agent.captures(lines[USER_AGENT_LINE]),
        "user_agent",
    );
    let trace_id = optional_group(grammar.trace.captures(lines[TRACE_LINE]), "trace_id");

    Ok(LogRow {
        timestamp,
        log_level: header["level"].to_string(),
        service: header["service"].to_string(),
        ticket_id: header["ticket_id"].to_string(),
        session_id: header["session_id"].to_string(),
        ip: metrics["ip"].to_string(),
        response_time_ms,
        cpu_percent,
        event_type: metrics["event_type"].to_string(),
        error: metrics["error"].to_string(),
        user_agent,
        trace_id,
    })
}

fn optional_group(captures: Option<Captures<'_>>, name: &str) -> Option<String> {
    captures
        .and_then(|caps| caps.name(name).map(|m| m.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const BLOCK: &str = r#"2025-07-01 10:15:00 [ERROR] billing-service - TicketID=T1001 SessionID=S55
IP=10.0.0.5 | ResponseTime=-1ms | CPU=87.5% | EventType=timeout | Error=true
UserAgent="Mozilla/5.0"
(unused line)
TraceID=abc123"#;

    #[test]
    fn test_parse_reference_block() {
        let row = parse_block(BLOCK).unwrap();

        let expected = NaiveDate::from_ymd_opt(2025, 7, 1)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        assert_eq!(row.timestamp, expected);
        assert_eq!(row.log_level, "ERROR");
        assert_eq!(row.service, "billing-service");
        assert_eq!(row.ticket_id, "T1001");
        assert_eq!(row.session_id, "S55");
        assert_eq!(row.ip, "10.0.0.5");
        assert_eq!(row.response_time_ms, -1);
        assert_eq!(row.cpu_percent, 87.5);
        assert_eq!(row.event_type, "timeout");
        assert_eq!(row.error, "true");
        assert_eq!(row.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(row.trace_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse_block(BLOCK).unwrap(), parse_block(BLOCK).unwrap());
    }

    #[test]
    fn test_surrounding_whitespace_and_blank_lines_ignored() {
        let padded = format!("\n\n   {}\n\n", BLOCK.replace('\n', "\n\n  "));
        assert_eq!(parse_block(&padded).unwrap(), parse_block(BLOCK).unwrap());
    }

    #[test]
    fn test_too_few_lines() {
        let short: String = BLOCK.lines().take(4).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            parse_block(&short),
            Err(BlockRejection::TooFewLines { found: 4 })
        ));
    }

    #[test]
    fn test_metrics_missing_delimiters_rejected() {
        let broken = BLOCK.replace(
            "IP=10.0.0.5 | ResponseTime=-1ms | CPU=87.5% | EventType=timeout | Error=true",
            "IP=10.0.0.5 ResponseTime=5ms",
        );
        assert!(matches!(
            parse_block(&broken),
            Err(BlockRejection::MetricsMismatch { .. })
        ));
    }

    #[test]
    fn test_header_missing_bracket_rejected() {
        let broken = BLOCK.replace("[ERROR]", "ERROR]");
        assert!(matches!(
            parse_block(&broken),
            Err(BlockRejection::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_header_missing_session_rejected() {
        let broken = BLOCK.replace(" SessionID=S55", "");
        assert!(matches!(
            parse_block(&broken),
            Err(BlockRejection::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_impossible_date_rejected() {
        let broken = BLOCK.replace("2025-07-01 10:15:00", "2025-13-41 10:15:00");
        assert!(matches!(
            parse_block(&broken),
            Err(BlockRejection::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_unparseable_cpu_rejected() {
        let broken = BLOCK.replace("CPU=87.5%", "CPU=high%");
        assert!(matches!(
            parse_block(&broken),
            Err(BlockRejection::InvalidCpu { .. })
        ));
    }

    #[test]
    fn test_response_time_overflow_rejected() {
        let broken = BLOCK.replace("ResponseTime=-1ms", "ResponseTime=99999999999999999999ms");
        assert!(matches!(
            parse_block(&broken),
            Err(BlockRejection::InvalidResponseTime { .. })
        ));
    }

    #[test]
    fn test_unquoted_user_agent_is_null() {
        let block = BLOCK.replace(r#"UserAgent="Mozilla/5.0""#, "UserAgent=Mozilla/5.0");
        let row = parse_block(&block).unwrap();
        assert_eq!(row.user_agent, None);
        assert_eq!(row.trace_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_missing_trace_is_null() {
        let block = BLOCK.replace("TraceID=abc123", "Trace: abc123");
        let row = parse_block(&block).unwrap();
        assert_eq!(row.trace_id, None);
    }

    #[test]
    fn test_line_four_is_not_examined() {
        let block = BLOCK.replace("(unused line)", "TraceID=should-not-be-used");
        let row = parse_block(&block).unwrap();
        assert_eq!(row.trace_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_raw_values_pass_through() {
        let block = BLOCK
            .replace("[ERROR]", "[warn ]")
            .replace("Error=true", "Error=N/A");
        let row = parse_block(&block).unwrap();
        assert_eq!(row.log_level, "warn ");
        assert_eq!(row.error, "N/A");
    }
}
