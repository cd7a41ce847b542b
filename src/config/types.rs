use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub object_store: ObjectStoreConfig,
    pub logs: LogsConfig,
    pub tickets: TicketsConfig,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// `s3://bucket[/base]`, `file:///dir` or `memory://`.
    pub url: String,
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

fn default_list_page_size() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_logs_prefix")]
    pub prefix: String,
    #[serde(default = "default_logs_suffix")]
    pub suffix: String,
    /// Local directory read by `upload-logs`.
    pub local_dir: Option<PathBuf>,
    #[serde(default)]
    pub local_file_prefix: String,
}

fn default_logs_prefix() -> String {
    "logs/".to_string()
}

fn default_logs_suffix() -> String {
    ".log".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsConfig {
    pub source: TicketSourceConfig,
    #[serde(default = "default_staging_key")]
    pub staging_key: String,
}

fn default_staging_key() -> String {
    "tickets/support_tickets.csv".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSourceConfig {
    pub path: PathBuf,
    #[serde(default = "default_source_table")]
    pub table: String,
}

fn default_source_table() -> String {
    "support_tickets".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
    #[serde(default)]
    pub stages: StageCommands,
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5 * 60)
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            stages: StageCommands::default(),
        }
    }
}

/// Shell commands run for the transformation stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageCommands {
    pub silver: Option<String>,
    pub gold: Option<String>,
}
