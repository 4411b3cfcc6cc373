//! Batch scheduler: parse, plan and dispatch every user concurrently.
//!
//! Each user's pipeline runs in its own tokio task behind a shared
//! [`Semaphore`], so at most `max_concurrent` users are in flight. A user's
//! failure (malformed input, a panicking task) is recorded in the
//! [`BatchReport`] and never touches the other users.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{TaskRunner, UserReport, dispatch_user};
use crate::error::AdcrewError;
use crate::parser::parse_task_configuration;
use crate::provider::UserTaskData;
use crate::sequencer::plan;
use crate::store::ImageStore;

/// A user whose pipeline stopped before producing outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserFailure {
    pub user_id: String,
    pub reason: String,
}

/// Everything one batch run produced, in input order per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub users: Vec<UserReport>,
    pub failures: Vec<UserFailure>,
}

impl BatchReport {
    pub fn tasks_succeeded(&self) -> usize {
        self.users.iter().map(UserReport::succeeded).sum()
    }

    pub fn tasks_failed(&self) -> usize {
        self.users.iter().map(UserReport::failed).sum()
    }
}

/// Called with the user id once each user's pipeline ends, whether it
/// finished, failed or panicked.
pub type UserFinished = Arc<dyn Fn(&str) + Send + Sync>;

pub struct BatchScheduler<R: TaskRunner + 'static> {
    runner: Arc<R>,
    store: Option<Arc<dyn ImageStore>>,
    max_concurrent: usize,
    on_user_finished: Option<UserFinished>,
}

impl<R: TaskRunner + 'static> BatchScheduler<R> {
    /// `max_concurrent` below one is raised to one.
    pub fn new(runner: Arc<R>, store: Option<Arc<dyn ImageStore>>, max_concurrent: usize) -> Self {
        Self {
            runner,
            store,
            max_concurrent: max_concurrent.max(1),
            on_user_finished: None,
        }
    }

    pub fn on_user_finished(mut self, hook: UserFinished) -> Self {
        self.on_user_finished = Some(hook);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Runs every user's pipeline with `now` deciding today's weekday.
    pub async fn run_batch(&self, users: Vec<UserTaskData>, now: DateTime<Utc>) -> BatchReport {
        let today = now.weekday();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        info!(
            users = users.len(),
            max_concurrent = self.max_concurrent,
            %today,
            "Starting batch"
        );

        let mut handles = Vec::with_capacity(users.len());
        for user in users {
            let sem = semaphore.clone();
            let runner = self.runner.clone();
            let store = self.store.clone();
            let user_id = user.user_id.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| AdcrewError::WorkerPool(e.to_string()))?;
                run_user(runner.as_ref(), store.as_deref(), &user, today).await
            });
            handles.push((user_id, handle));
        }

        let mut report = BatchReport::default();
        for (user_id, handle) in handles {
            let outcome = handle.await;
            if let Some(hook) = &self.on_user_finished {
                hook(&user_id);
            }
            match outcome {
                Ok(Ok(user_report)) => report.users.push(user_report),
                Ok(Err(err)) => {
                    warn!(user_id = %user_id, error = %err, "User pipeline failed");
                    report.failures.push(UserFailure {
                        user_id,
                        reason: err.to_string(),
                    });
                }
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        "dispatch panicked".to_string()
                    } else {
                        format!("dispatch cancelled: {join_err}")
                    };
                    error!(user_id = %user_id, %reason, "User pipeline aborted");
                    report.failures.push(UserFailure { user_id, reason });
                }
            }
        }

        info!(
            users = report.users.len(),
            failed_users = report.failures.len(),
            tasks_succeeded = report.tasks_succeeded(),
            tasks_failed = report.tasks_failed(),
            "Batch finished"
        );
        report
    }
}

async fn run_user<R: TaskRunner + ?Sized>(
    runner: &R,
    store: Option<&dyn ImageStore>,
    user: &UserTaskData,
    today: Weekday,
) -> Result<UserReport, AdcrewError> {
    let tasks = parse_task_configuration(&user.data, today)?;
    let execution = plan(tasks);
    for skipped in &execution.skipped {
        debug!(
            user_id = %user.user_id,
            employee = %skipped.employee_name,
            reason = %skipped.reason,
            "Task skipped"
        );
    }
    Ok(dispatch_user(runner, &user.user_id, &execution.ordered, store).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::employees::TaskConfiguration;
    use crate::error::ExecutionFailure;
    use crate::services::TaskReport;
    use crate::store::MemoryImageStore;

    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap()
    }

    fn tuesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
    }

    fn user(id: &str, data: serde_json::Value) -> UserTaskData {
        UserTaskData {
            user_id: id.into(),
            data,
        }
    }

    /// Records `(user, employee)` calls; panics on `panic_on`.
    #[derive(Default)]
    struct RecordingRunner {
        panic_on: Option<(&'static str, &'static str)>,
        calls: Mutex<Vec<(String, String)>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TaskRunner for RecordingRunner {
        async fn run(
            &self,
            task: &TaskConfiguration,
            user_id: &str,
            _store: Option<&dyn ImageStore>,
        ) -> Result<TaskReport, ExecutionFailure> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.calls
                .lock()
                .unwrap()
                .push((user_id.to_string(), task.employee_name().to_string()));
            let should_panic = self
                .panic_on
                .is_some_and(|(u, e)| u == user_id && e == task.employee_name());
            if should_panic {
                panic!("runner blew up");
            }
            Ok(TaskReport::new(1, "ok"))
        }
    }

    fn three_tasks() -> serde_json::Value {
        json!({
            "marcus": {"adsPerDay": 1, "days": ["Wed"]},
            "cameron": {"landingUrl": "https://shop.test"},
            "avery": {"tone": "playful"}
        })
    }

    #[tokio::test]
    async fn panicking_user_does_not_affect_others() {
        let runner = Arc::new(RecordingRunner {
            panic_on: Some(("A", "avery")),
            ..Default::default()
        });
        let scheduler = BatchScheduler::new(runner.clone(), None, 4);

        let report = scheduler
            .run_batch(vec![user("A", three_tasks()), user("B", three_tasks())], wednesday())
            .await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, "A");
        assert_eq!(report.failures[0].reason, "dispatch panicked");

        assert_eq!(report.users.len(), 1);
        let b = &report.users[0];
        assert_eq!(b.user_id, "B");
        let names: Vec<&str> = b.outcomes.iter().map(|o| o.employee_name.as_str()).collect();
        assert_eq!(names, vec!["marcus", "avery", "cameron"]);
        assert!(b.outcomes.iter().all(|o| o.succeeded));

        // A stopped at its second task.
        let calls = runner.calls.lock().unwrap();
        let a_calls: Vec<&str> = calls
            .iter()
            .filter(|(u, _)| u == "A")
            .map(|(_, e)| e.as_str())
            .collect();
        assert_eq!(a_calls, vec!["marcus", "avery"]);
    }

    #[tokio::test]
    async fn finished_hook_counts_panicked_users() {
        let runner = Arc::new(RecordingRunner {
            panic_on: Some(("A", "avery")),
            ..Default::default()
        });
        let finished = Arc::new(Mutex::new(Vec::new()));
        let seen = finished.clone();
        let scheduler = BatchScheduler::new(runner, None, 2).on_user_finished(Arc::new(
            move |user_id: &str| {
                seen.lock().unwrap().push(user_id.to_string());
            },
        ));

        let users = vec![
            user("A", three_tasks()),
            user("B", three_tasks()),
            user("C", serde_json::Value::Null),
        ];
        let report = scheduler.run_batch(users, wednesday()).await;

        assert_eq!(report.failures.len(), 2);
        assert_eq!(*finished.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn weekday_decides_what_runs() {
        let data = json!({
            "marcus": {"adsPerDay": "3", "days": ["Mon", "Wed", "Fri"]},
            "valentina": {"spell": true}
        });
        let runner = Arc::new(RecordingRunner::default());
        let scheduler = BatchScheduler::new(runner.clone(), None, 2);

        let report = scheduler
            .run_batch(vec![user("u1", data.clone())], wednesday())
            .await;
        let names: Vec<&str> = report.users[0]
            .outcomes
            .iter()
            .map(|o| o.employee_name.as_str())
            .collect();
        assert_eq!(names, vec!["marcus", "valentina"]);

        let report = scheduler.run_batch(vec![user("u1", data)], tuesday()).await;
        assert!(report.users[0].outcomes.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn malformed_user_is_recorded_and_batch_continues() {
        let runner = Arc::new(RecordingRunner::default());
        let scheduler = BatchScheduler::new(runner, None, 2);

        let report = scheduler
            .run_batch(
                vec![
                    user("bad", serde_json::Value::Null),
                    user("good", json!({"marcus": {"days": ["Wed"]}})),
                ],
                wednesday(),
            )
            .await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, "bad");
        assert!(report.failures[0].reason.starts_with("Malformed task input"));
        assert_eq!(report.users.len(), 1);
        assert_eq!(report.tasks_succeeded(), 1);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let runner = Arc::new(RecordingRunner::default());
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        let scheduler = BatchScheduler::new(runner.clone(), None, 2).on_user_finished(Arc::new(
            move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        let users = (0..6)
            .map(|i| user(&format!("u{i}"), json!({"marcus": {"days": ["Wed"]}})))
            .collect();
        let report = scheduler.run_batch(users, wednesday()).await;

        assert_eq!(report.users.len(), 6);
        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(finished.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn zero_concurrency_is_raised_to_one() {
        let scheduler = BatchScheduler::new(Arc::new(RecordingRunner::default()), None, 0);
        assert_eq!(scheduler.max_concurrent(), 1);
    }

    #[tokio::test]
    async fn shared_store_is_used_across_users() {
        use crate::dispatcher::EmployeeRunner;
        use crate::services::testing::services;

        let store = Arc::new(MemoryImageStore::new());
        let scheduler = BatchScheduler::new(
            Arc::new(EmployeeRunner::new(services())),
            Some(store.clone() as Arc<dyn ImageStore>),
            3,
        );
        let users = vec![
            user("u1", json!({"marcus": {"adsPerDay": 2, "days": ["Wed"]}})),
            user("u2", json!({"marcus": {"adsPerDay": 1, "days": ["Wed"]}})),
        ];

        let report = scheduler.run_batch(users, wednesday()).await;
        assert_eq!(report.tasks_succeeded(), 2);
        assert_eq!(store.records("u1").await.len(), 2);
        assert_eq!(store.records("u2").await.len(), 1);
    }
}
