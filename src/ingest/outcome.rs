use crate::warehouse::RejectedRecord;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    Logs,
    Tickets,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::Logs => f.write_str("logs"),
            Pipeline::Tickets => f.write_str("tickets"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Every extracted row reached the sink.
    Loaded,
    /// Some rows were rejected at the sink boundary.
    PartiallyLoaded,
    /// The idempotency gate short-circuited the load.
    Skipped,
    /// Nothing new to extract.
    UpToDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub files: usize,
    pub rows_extracted: u64,
    /// Log blocks dropped by the parser.
    pub blocks_rejected: u64,
    pub rows_loaded: u64,
    pub rows_rejected: u64,
}

/// Result of one ingestion run, independent of how it is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub pipeline: Pipeline,
    pub kind: OutcomeKind,
    pub message: String,
    pub counts: RunCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}

impl RunOutcome {
    pub fn new(pipeline: Pipeline, kind: OutcomeKind, message: impl Into<String>) -> Self {
        Self {
            pipeline,
            kind,
            message: message.into(),
            counts: RunCounts::default(),
            rejected: Vec::new(),
        }
    }

    pub fn with_counts(mut self, counts: RunCounts) -> Self {
        self.counts = counts;
        self
    }

    pub fn with_rejected(mut self, rejected: Vec<RejectedRecord>) -> Self {
        self.rejected = rejected;
        self
    }

    /// Emit the outcome on the operator log stream.
    pub fn report(&self) {
        tracing::info!(
            pipeline = %self.pipeline,
            kind = ?self.kind,
            files = self.counts.files,
            rows_extracted = self.counts.rows_extracted,
            blocks_rejected = self.counts.blocks_rejected,
            rows_loaded = self.counts.rows_loaded,
            rows_rejected = self.counts.rows_rejected,
            "{}",
            self.message
        );
    }
}
