use super::{
    Dag, RetryPolicy, TaskExecutor, WorkflowError, LOAD_LOGS, LOAD_TICKETS, TRANSFORM_GOLD,
    TRANSFORM_SILVER,
};
use crate::config::types::{Config, WorkflowConfig};
use crate::ingest::{load_logs, load_tickets, RunOutcome};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::info;

/// Both loads run before the silver transform, gold runs last.
pub fn careplus_dag() -> Dag {
    Dag::new()
        .task(LOAD_TICKETS, &[])
        .task(LOAD_LOGS, &[])
        .task(TRANSFORM_SILVER, &[LOAD_TICKETS, LOAD_LOGS])
        .task(TRANSFORM_GOLD, &[TRANSFORM_SILVER])
}

impl From<&WorkflowConfig> for RetryPolicy {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            retries: config.retries,
            delay: config.retry_delay,
        }
    }
}

/// Executes the scheduled tasks against a loaded config.
pub struct CareplusTasks<'a> {
    config: &'a Config,
    outcomes: Mutex<Vec<RunOutcome>>,
}

impl<'a> CareplusTasks<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Outcomes of the ingestion tasks that have succeeded so far.
    pub fn into_outcomes(self) -> Vec<RunOutcome> {
        self.outcomes
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, outcome: RunOutcome) -> String {
        outcome.report();
        let summary = outcome.message.clone();
        match self.outcomes.lock() {
            Ok(mut outcomes) => outcomes.push(outcome),
            Err(poisoned) => poisoned.into_inner().push(outcome),
        }
        summary
    }

    async fn transform(&self, task: &str, command: Option<&str>) -> Result<String, WorkflowError> {
        let Some(command) = command else {
            info!(task, "No command configured, skipping stage");
            return Ok("no command configured".to_string());
        };
        run_stage_command(command).await?;
        Ok(format!("ran `{command}`"))
    }
}

#[async_trait]
impl TaskExecutor for CareplusTasks<'_> {
    async fn execute(&self, task: &str) -> Result<String, WorkflowError> {
        let stages = &self.config.workflow.stages;
        match task {
            LOAD_TICKETS => Ok(self.record(load_tickets(self.config).await?)),
            LOAD_LOGS => Ok(self.record(load_logs(self.config).await?)),
            TRANSFORM_SILVER => self.transform(task, stages.silver.as_deref()).await,
            TRANSFORM_GOLD => self.transform(task, stages.gold.as_deref()).await,
            other => Err(WorkflowError::UnknownTask(other.to_string())),
        }
    }
}

/// Run a stage command through `sh -c`; a non-zero exit is a task failure.
pub async fn run_stage_command(command: &str) -> Result<(), WorkflowError> {
    info!(%command, "Running stage command");
    let status = Command::new("sh").arg("-c").arg(command).status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(WorkflowError::StageCommand {
            command: command.to_string(),
            status: status.to_string(),
        })
    }
}
