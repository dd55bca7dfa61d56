// src/job.rs
use crate::{Result, StateError, Task, TaskRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current snapshot schema version, stored with every serialized job.
const SNAPSHOT_VERSION: u32 = 1;

fn snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Scheduling and retry options applied at construction.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Do not run before this instant. `None` means runnable immediately.
    pub execute_at: Option<DateTime<Utc>>,
    /// Give up after this many failed attempts. `None` means unlimited.
    pub max_failed_attempts: Option<u32>,
    /// Delay added to the due time after each recoverable failure.
    pub backoff_interval: Option<Duration>,
}

/// Outcome of a single `run()`, excluding precondition violations.
///
/// Recoverable and terminal failures both carry the original execution error
/// so the caller can log the failure detail; the variant alone decides
/// whether the job goes back on the queue.
#[derive(Debug)]
pub enum RunOutcome {
    /// The payload succeeded; the job is completed and must not run again.
    Completed,
    /// The payload failed but attempts remain; requeue the job.
    Retry(anyhow::Error),
    /// The payload failed and the attempt budget is exhausted; drop the job.
    Exhausted(anyhow::Error),
}

/// A unit of work together with its scheduling state and retry policy.
///
/// The snapshot serializes in full (including the task type identity) so a
/// job can be parked in the store and reconstructed by any worker that has
/// the task registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(default = "snapshot_version")]
    version: u32,
    task: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    execute_at: Option<DateTime<Utc>>,
    completed: bool,
    failed_attempts: u32,
    max_failed_attempts: Option<u32>,
    #[serde(with = "opt_duration_millis", default)]
    backoff_interval: Option<Duration>,
}

impl Job {
    /// Create an immediately runnable job with unlimited attempts.
    pub fn new<T: Task>(task: &T) -> Result<Self> {
        Self::with_options(task, JobOptions::default())
    }

    /// Create a job with explicit scheduling and retry options.
    pub fn with_options<T: Task>(task: &T, options: JobOptions) -> Result<Self> {
        Ok(Self {
            version: SNAPSHOT_VERSION,
            task: T::name().to_string(),
            payload: serde_json::to_value(task)?,
            created_at: Utc::now(),
            execute_at: options.execute_at,
            completed: false,
            failed_attempts: 0,
            max_failed_attempts: options.max_failed_attempts,
            backoff_interval: options.backoff_interval,
        })
    }

    /// Execute the job's payload, enforcing the state machine.
    ///
    /// Preconditions: the job must be due, not completed and not failed;
    /// violating any of them returns a `StateError` and mutates nothing.
    /// A payload failure increments `failed_attempts` and, when attempts
    /// remain and a backoff interval is set, pushes `execute_at` to
    /// now + backoff before the error is handed back in the outcome.
    pub async fn run(
        &mut self,
        registry: &TaskRegistry,
    ) -> std::result::Result<RunOutcome, StateError> {
        if !self.is_time_to_run() {
            return Err(StateError::NotDue(self.task.clone()));
        }

        if self.completed {
            return Err(StateError::AlreadyCompleted(self.task.clone()));
        }

        if self.is_failed() {
            return Err(StateError::AlreadyFailed(self.task.clone()));
        }

        match registry.run_task(&self.task, self.payload.clone()).await {
            Ok(()) => {
                self.completed = true;
                Ok(RunOutcome::Completed)
            }
            Err(error) => {
                self.failed_attempts += 1;

                if self.is_failed() {
                    Ok(RunOutcome::Exhausted(error))
                } else {
                    if let Some(backoff) = self.backoff_interval {
                        self.execute_at = Some(
                            Utc::now() + chrono::Duration::milliseconds(backoff.as_millis() as i64),
                        );
                    }
                    Ok(RunOutcome::Retry(error))
                }
            }
        }
    }

    /// True when `execute_at` is absent or has passed.
    pub fn is_time_to_run(&self) -> bool {
        match self.execute_at {
            Some(execute_at) => Utc::now() >= execute_at,
            None => true,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// True when the job is not completed and its attempt budget is spent.
    pub fn is_failed(&self) -> bool {
        !self.completed
            && self
                .max_failed_attempts
                .is_some_and(|max| self.failed_attempts >= max)
    }

    pub fn task_name(&self) -> &str {
        &self.task
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn execute_at(&self) -> Option<DateTime<Utc>> {
        self.execute_at
    }

    /// Reschedule the job. Valid only between runs.
    pub fn set_execute_at(&mut self, execute_at: Option<DateTime<Utc>>) {
        self.execute_at = execute_at;
    }

    pub fn set_max_failed_attempts(&mut self, max_failed_attempts: Option<u32>) {
        self.max_failed_attempts = max_failed_attempts;
    }

    pub fn set_backoff_interval(&mut self, backoff_interval: Option<Duration>) {
        self.backoff_interval = backoff_interval;
    }
}

/// Serde helper for `Option<Duration>` as integer milliseconds.
mod opt_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => (d.as_millis() as u64).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
