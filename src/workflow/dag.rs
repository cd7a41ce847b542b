use super::WorkflowError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
struct TaskSpec {
    name: String,
    upstream: Vec<String>,
}

/// Task graph. Edges point from upstream tasks to the tasks that wait on them.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    tasks: Vec<TaskSpec>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, name: &str, upstream: &[&str]) -> Self {
        self.tasks.push(TaskSpec {
            name: name.to_string(),
            upstream: upstream.iter().map(|u| u.to_string()).collect(),
        });
        self
    }

    /// Topological order; ties keep declaration order.
    pub fn execution_order(&self) -> Result<Vec<&str>, WorkflowError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(WorkflowError::DuplicateTask(task.name.clone()));
            }
        }
        for task in &self.tasks {
            if let Some(missing) = task.upstream.iter().find(|u| !seen.contains(u.as_str())) {
                return Err(WorkflowError::UnknownUpstream {
                    task: task.name.clone(),
                    upstream: missing.clone(),
                });
            }
        }

        let mut pending: HashMap<&str, usize> = self
            .tasks
            .iter()
            .map(|t| (t.name.as_str(), t.upstream.len()))
            .collect();
        let mut order = Vec::with_capacity(self.tasks.len());

        while order.len() < self.tasks.len() {
            let Some(next) = self
                .tasks
                .iter()
                .map(|t| t.name.as_str())
                .find(|name| pending.get(name) == Some(&0))
            else {
                let mut stuck: Vec<&str> = pending.keys().copied().collect();
                stuck.sort_unstable();
                return Err(WorkflowError::Cycle(stuck.join(", ")));
            };

            pending.remove(next);
            for task in &self.tasks {
                if task.upstream.iter().any(|u| u == next) {
                    if let Some(count) = pending.get_mut(task.name.as_str()) {
                        *count -= 1;
                    }
                }
            }
            order.push(next);
        }

        Ok(order)
    }

    /// Run every task whose upstream tasks all succeeded.
    ///
    /// A task that exhausts its retries does not stop independent tasks;
    /// everything downstream of it is reported as not run. The run fails
    /// once all runnable tasks have finished.
    pub async fn run(
        &self,
        executor: &dyn TaskExecutor,
        policy: RetryPolicy,
    ) -> Result<Vec<TaskReport>, WorkflowError> {
        let order = self.execution_order()?;
        let mut reports = Vec::with_capacity(order.len());
        let mut blocked: HashSet<&str> = HashSet::new();
        let mut failures = Vec::new();
        let mut not_run = Vec::new();

        for task in order {
            let upstream_ok = self
                .upstream_of(task)
                .iter()
                .all(|u| !blocked.contains(u.as_str()));
            if !upstream_ok {
                warn!(task, "Upstream task did not succeed, not running");
                blocked.insert(task);
                not_run.push(task.to_string());
                reports.push(TaskReport::not_run(task));
                continue;
            }

            match run_with_retries(task, executor, policy).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    blocked.insert(task);
                    reports.push(TaskReport::failed(task, &e));
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            info!(tasks = reports.len(), "Workflow complete");
            return Ok(reports);
        }

        let failed: Vec<String> = reports
            .iter()
            .filter(|r| r.state == TaskState::Failed)
            .map(|r| r.task.clone())
            .collect();
        error!(failed = ?failed, not_run = ?not_run, "Workflow incomplete");
        Err(WorkflowError::Incomplete {
            failed,
            not_run,
            first: Box::new(failures.remove(0)),
        })
    }

    fn upstream_of(&self, task: &str) -> &[String] {
        self.tasks
            .iter()
            .find(|t| t.name == task)
            .map(|t| t.upstream.as_slice())
            .unwrap_or_default()
    }
}

/// Fixed retry count and delay, applied per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Succeeded,
    Failed,
    /// An upstream task failed or was itself not run.
    NotRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub state: TaskState,
    pub attempts: u32,
    /// Task summary on success, error text on failure.
    pub summary: String,
}

impl TaskReport {
    fn failed(task: &str, error: &WorkflowError) -> Self {
        let attempts = match error {
            WorkflowError::TaskFailed { attempts, .. } => *attempts,
            _ => 0,
        };
        Self {
            task: task.to_string(),
            state: TaskState::Failed,
            attempts,
            summary: error.to_string(),
        }
    }

    fn not_run(task: &str) -> Self {
        Self {
            task: task.to_string(),
            state: TaskState::NotRun,
            attempts: 0,
            summary: String::new(),
        }
    }
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run one task to completion and return a one-line summary.
    async fn execute(&self, task: &str) -> Result<String, WorkflowError>;
}

async fn run_with_retries(
    task: &str,
    executor: &dyn TaskExecutor,
    policy: RetryPolicy,
) -> Result<TaskReport, WorkflowError> {
    let max_attempts = policy.retries + 1;
    let mut attempt = 1;

    loop {
        info!(task, attempt, "Starting task");
        match executor.execute(task).await {
            Ok(summary) => {
                info!(task, attempt, %summary, "Task succeeded");
                return Ok(TaskReport {
                    task: task.to_string(),
                    state: TaskState::Succeeded,
                    attempts: attempt,
                    summary,
                });
            }
            Err(e) if attempt < max_attempts => {
                warn!(task, attempt, error = %e, delay = ?policy.delay, "Task failed, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(task, attempt, error = %e, "Task failed");
                return Err(WorkflowError::TaskFailed {
                    task: task.to_string(),
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
        }
    }
}
