//! In-process rendering of the daily schedule:
//! `[load_tickets, load_logs] -> transform_silver -> transform_gold`.

pub mod dag;
pub mod tasks;

pub use dag::{Dag, RetryPolicy, TaskExecutor, TaskReport, TaskState};
pub use tasks::{careplus_dag, CareplusTasks};

use crate::ingest::IngestError;
use thiserror::Error;

pub const LOAD_TICKETS: &str = "load_tickets";
pub const LOAD_LOGS: &str = "load_logs";
pub const TRANSFORM_SILVER: &str = "transform_silver";
pub const TRANSFORM_GOLD: &str = "transform_gold";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("task '{task}' depends on unknown task '{upstream}'")]
    UnknownUpstream { task: String, upstream: String },

    #[error("duplicate task '{0}'")]
    DuplicateTask(String),

    #[error("dependency cycle among tasks: {0}")]
    Cycle(String),

    #[error("no executor for task '{0}'")]
    UnknownTask(String),

    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("stage command `{command}` exited with {status}")]
    StageCommand { command: String, status: String },

    #[error("failed to spawn stage command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(
        "workflow incomplete: failed [{}], not run [{}]: {first}",
        .failed.join(", "),
        .not_run.join(", ")
    )]
    Incomplete {
        failed: Vec<String>,
        not_run: Vec<String>,
        #[source]
        first: Box<WorkflowError>,
    },

    #[error("task '{task}' failed after {attempts} attempt(s): {source}")]
    TaskFailed {
        task: String,
        attempts: u32,
        #[source]
        source: Box<WorkflowError>,
    },
}
