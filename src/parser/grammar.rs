//! Line grammar of a support-log block.
//!
//! A block is five or more non-empty lines. Each line has a fixed role:
//!
//! ```text
//! 0  HEADER      2025-07-01 10:15:00 [ERROR] billing-service - TicketID=T1001 SessionID=S55
//! 1  METRICS     IP=10.0.0.5 | ResponseTime=-1ms | CPU=87.5% | EventType=timeout | Error=true
//! 2  USER_AGENT  UserAgent="Mozilla/5.0"
//! 3  (reserved, never examined)
//! 4  TRACE       TraceID=abc123
//! ```
//!
//! Header and metrics lines are required. User agent and trace lines are
//! optional and yield `None` when they do not match.
//!
//! All patterns are anchored at the start of the line only; trailing text
//! after the last group is tolerated.

use regex::Regex;
use std::sync::OnceLock;

/// Separator between blocks inside a log file.
pub const BLOCK_SEPARATOR: &str = "---";

/// Minimum number of non-empty lines a block must carry.
pub const MIN_BLOCK_LINES: usize = 5;

pub const HEADER_LINE: usize = 0;
pub const METRICS_LINE: usize = 1;
pub const USER_AGENT_LINE: usize = 2;
pub const TRACE_LINE: usize = 4;

/// Format of the header timestamp (`YYYY-MM-DD HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Groups: `ts`, `level`, `service`, `ticket_id`, `session_id`.
pub const HEADER_PATTERN: &str = r"^(?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[(?P<level>.+?)\] (?P<service>.+?) - TicketID=(?P<ticket_id>\S+) SessionID=(?P<session_id>\S+)";

/// Groups: `ip`, `response_ms` (signed), `cpu` (the `%` is consumed),
/// `event_type`, `error`.
pub const METRICS_PATTERN: &str = r"^IP=(?P<ip>\S+) \| ResponseTime=(?P<response_ms>-?\d+)ms \| CPU=(?P<cpu>\S+)% \| EventType=(?P<event_type>\S+) \| Error=(?P<error>\S+)";

/// Group: `user_agent` (the text between the quotes).
pub const USER_AGENT_PATTERN: &str = r#"^UserAgent="(?P<user_agent>.+?)""#;

/// Group: `trace_id` (rest of the line).
pub const TRACE_PATTERN: &str = r"^TraceID=(?P<trace_id>.+)";

/// Compiled form of the block grammar.
#[derive(Debug)]
pub struct Grammar {
    pub header: Regex,
    pub metrics: Regex,
    pub user_agent: Regex,
    pub trace: Regex,
}

impl Grammar {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            header: Regex::new(HEADER_PATTERN)?,
            metrics: Regex::new(METRICS_PATTERN)?,
            user_agent: Regex::new(USER_AGENT_PATTERN)?,
            trace: Regex::new(TRACE_PATTERN)?,
        })
    }
}

/// Shared compiled grammar. Compilation failure is reported as a
/// `regex::Error` on every call instead of panicking.
pub fn grammar() -> Result<&'static Grammar, regex::Error> {
    static GRAMMAR: OnceLock<Result<Grammar, regex::Error>> = OnceLock::new();
    GRAMMAR
        .get_or_init(Grammar::compile)
        .as_ref()
        .map_err(|e| e.clone())
}
