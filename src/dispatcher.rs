//! Sequential execution of one user's ordered task list.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::employees::{EmployeeRole, TaskConfiguration};
use crate::error::ExecutionFailure;
use crate::services::{ExecutionContext, Services, TaskReport};
use crate::store::ImageStore;

/// Executes a single task for a user.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(
        &self,
        task: &TaskConfiguration,
        user_id: &str,
        store: Option<&dyn ImageStore>,
    ) -> Result<TaskReport, ExecutionFailure>;
}

/// Runs tasks through their role's configuration with the shared services.
pub struct EmployeeRunner {
    services: Services,
}

impl EmployeeRunner {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl TaskRunner for EmployeeRunner {
    async fn run(
        &self,
        task: &TaskConfiguration,
        user_id: &str,
        store: Option<&dyn ImageStore>,
    ) -> Result<TaskReport, ExecutionFailure> {
        let Some(config) = task.config() else {
            return Err(ExecutionFailure::Other(format!(
                "no handler for employee '{}'",
                task.employee_name()
            )));
        };
        let ctx = ExecutionContext {
            user_id,
            store,
            services: &self.services,
        };
        config.execute(&ctx).await
    }
}

/// Result of one task attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub employee_name: String,
    pub role: EmployeeRole,
    pub succeeded: bool,
    pub error: Option<String>,
    pub report: Option<TaskReport>,
    pub duration_ms: u64,
}

/// Outcomes of one user's dispatch, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserReport {
    pub user_id: String,
    pub outcomes: Vec<TaskOutcome>,
}

impl UserReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Runs `tasks` strictly one after another. A failing task is logged and
/// recorded; the remaining tasks still run.
pub async fn dispatch_user<R: TaskRunner + ?Sized>(
    runner: &R,
    user_id: &str,
    tasks: &[TaskConfiguration],
    store: Option<&dyn ImageStore>,
) -> UserReport {
    let mut outcomes = Vec::with_capacity(tasks.len());

    for task in tasks {
        let started = Instant::now();
        let result = runner.run(task, user_id, store).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(report) => {
                info!(
                    user_id,
                    employee = task.employee_name(),
                    role = %task.role(),
                    produced = report.produced,
                    duration_ms,
                    "task completed"
                );
                TaskOutcome {
                    employee_name: task.employee_name().to_string(),
                    role: task.role(),
                    succeeded: true,
                    error: None,
                    report: Some(report),
                    duration_ms,
                }
            }
            Err(err) => {
                warn!(
                    user_id,
                    employee = task.employee_name(),
                    role = %task.role(),
                    error = %err,
                    duration_ms,
                    "task failed"
                );
                TaskOutcome {
                    employee_name: task.employee_name().to_string(),
                    role: task.role(),
                    succeeded: false,
                    error: Some(err.to_string()),
                    report: None,
                    duration_ms,
                }
            }
        };
        outcomes.push(outcome);
    }

    UserReport {
        user_id: user_id.to_string(),
        outcomes,
    }
}
