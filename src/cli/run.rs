use crate::config::{load_config, Config, ConfigError};
use crate::ingest::{self, IngestError, RunOutcome, UploadSummary};
use crate::workflow::{careplus_dag, CareplusTasks, RetryPolicy, TaskReport, WorkflowError};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "config not found (searched ~/.config/careplus/config.yml and /etc/careplus/config.yml); \
         use --config <path> or run 'careplus config init'"
    )]
    ConfigNotFound,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("failed to render output: {0}")]
    Json(#[from] serde_json::Error),
}

fn require_config(config_path: Option<PathBuf>) -> Result<Config, RunError> {
    let path = config_path.ok_or(RunError::ConfigNotFound)?;
    info!(config_path = %path.display(), "Loading configuration");
    Ok(load_config(&path)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), RunError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit(outcome: &RunOutcome, json: bool) -> Result<(), RunError> {
    if json {
        print_json(outcome)
    } else {
        outcome.report();
        Ok(())
    }
}

pub async fn load_tickets(config_path: Option<PathBuf>, json: bool) -> Result<(), RunError> {
    let config = require_config(config_path)?;
    let outcome = ingest::load_tickets(&config).await?;
    emit(&outcome, json)
}

pub async fn load_logs(config_path: Option<PathBuf>, json: bool) -> Result<(), RunError> {
    let config = require_config(config_path)?;
    let outcome = ingest::load_logs(&config).await?;
    emit(&outcome, json)
}

pub async fn upload_logs(config_path: Option<PathBuf>, json: bool) -> Result<(), RunError> {
    let config = require_config(config_path)?;
    let summary: UploadSummary = ingest::upload_logs(&config).await?;
    if json {
        print_json(&summary)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct WorkflowSummary {
    tasks: Vec<TaskReport>,
    outcomes: Vec<RunOutcome>,
}

/// Run the full schedule once: both loads, then the transformation stages.
pub async fn run_workflow(config_path: Option<PathBuf>, json: bool) -> Result<(), RunError> {
    let config = require_config(config_path)?;
    let policy = RetryPolicy::from(&config.workflow);
    let tasks = CareplusTasks::new(&config);

    let reports = careplus_dag().run(&tasks, policy).await?;

    if json {
        print_json(&WorkflowSummary {
            tasks: reports,
            outcomes: tasks.into_outcomes(),
        })?;
    }
    Ok(())
}
