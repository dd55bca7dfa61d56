// src/worker.rs
use crate::{Queue, Result, RunOutcome, TaskRegistry};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::time::Duration;
use tracing::{error, info};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long to suspend when a pop finds the queue empty.
    pub poll_interval: Duration,
    pub worker_id: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            worker_id: format!("worker-{}", uuid::Uuid::new_v4()),
        }
    }
}

/// Outcome of a single loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The queue was empty after migration.
    Idle,
    /// The popped job was not yet due and was pushed back. Should not occur
    /// under the queue's contract; guards clock-skew and requeue races.
    Requeued,
    /// The job ran to completion and was dropped from the queue.
    Completed,
    /// The job failed with attempts remaining and was pushed back.
    Retried,
    /// The job failed with its attempt budget exhausted; it was dropped and
    /// its last state exists only in the log.
    Exhausted,
}

/// A single sequential dispatch loop over an injected queue.
///
/// Job execution runs synchronously on the loop: a slow payload blocks all
/// further dequeuing. Scale-out is running more worker processes against the
/// same queue, not internal parallelism.
pub struct Worker<Q: Queue> {
    queue: Q,
    registry: Arc<TaskRegistry>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl<Q: Queue> Worker<Q> {
    pub fn new(queue: Q, registry: Arc<TaskRegistry>, config: WorkerConfig) -> Self {
        Self {
            queue,
            registry,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the dispatch loop until [`stop`](Self::stop) is called.
    ///
    /// Per-job failures are handled inside [`tick`](Self::tick) and never
    /// stop the loop. Anything escaping `tick` (store faults, state-machine
    /// misuse) is logged at error level and the loop continues; the process
    /// exits only on external termination.
    pub async fn run(&self) {
        info!(worker_id = %self.config.worker_id, "worker started");

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(TickOutcome::Idle) => {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(worker_id = %self.config.worker_id, error = %e, "unexpected error in worker loop");
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "worker stopped");
    }

    /// Process at most one job: pop, defensively re-check the due time,
    /// execute, and requeue on a recoverable failure.
    ///
    /// Execution failures are contained here and reflected in the outcome;
    /// only store faults and state errors propagate.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let Some(mut job) = self.queue.pop().await? else {
            return Ok(TickOutcome::Idle);
        };

        if !job.is_time_to_run() {
            self.queue.push(&job).await?;
            return Ok(TickOutcome::Requeued);
        }

        match job.run(&self.registry).await? {
            RunOutcome::Completed => {
                info!(
                    task = job.task_name(),
                    failed_attempts = job.failed_attempts(),
                    "job completed"
                );
                Ok(TickOutcome::Completed)
            }
            RunOutcome::Retry(err) => {
                self.queue.push(&job).await?;
                error!(
                    task = job.task_name(),
                    failed_attempts = job.failed_attempts(),
                    error = %err,
                    "job failed, requeued for retry"
                );
                Ok(TickOutcome::Retried)
            }
            RunOutcome::Exhausted(err) => {
                error!(
                    task = job.task_name(),
                    failed_attempts = job.failed_attempts(),
                    error = %err,
                    "job failed permanently, dropping"
                );
                Ok(TickOutcome::Exhausted)
            }
        }
    }

    /// Signal the loop to exit after the current iteration.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DelayqError, Job, JobOptions, MemoryQueue, Task};
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Mutex;

    #[derive(Serialize, Deserialize)]
    struct Counted;

    static COUNTED_RUNS: AtomicU32 = AtomicU32::new(0);

    #[async_trait::async_trait]
    impl Task for Counted {
        async fn perform(&self) -> anyhow::Result<()> {
            COUNTED_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name() -> &'static str {
            "Counted"
        }
    }

    #[derive(Serialize, Deserialize)]
    struct LoopCounted;

    static LOOP_RUNS: AtomicU32 = AtomicU32::new(0);

    #[async_trait::async_trait]
    impl Task for LoopCounted {
        async fn perform(&self) -> anyhow::Result<()> {
            LOOP_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name() -> &'static str {
            "LoopCounted"
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Flaky;

    #[async_trait::async_trait]
    impl Task for Flaky {
        async fn perform(&self) -> anyhow::Result<()> {
            anyhow::bail!("simulated failure")
        }

        fn name() -> &'static str {
            "Flaky"
        }
    }

    fn registry() -> Arc<TaskRegistry> {
        let mut registry = TaskRegistry::new();
        registry
            .register::<Counted>()
            .register::<LoopCounted>()
            .register::<Flaky>();
        Arc::new(registry)
    }

    fn worker(queue: MemoryQueue) -> Worker<MemoryQueue> {
        Worker::new(
            queue,
            registry(),
            WorkerConfig {
                poll_interval: Duration::from_millis(10),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn idle_ticks_do_not_error() {
        let worker = worker(MemoryQueue::new());

        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Idle);
        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn successful_job_is_dropped_from_the_queue() {
        let queue = MemoryQueue::new();
        queue.push(&Job::new(&Counted).unwrap()).await.unwrap();
        let worker = worker(queue);

        let before = COUNTED_RUNS.load(Ordering::SeqCst);
        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Completed);
        assert_eq!(COUNTED_RUNS.load(Ordering::SeqCst), before + 1);
        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn recoverable_failure_is_requeued_with_the_attempt_recorded() {
        let queue = MemoryQueue::new();
        let job = Job::with_options(
            &Flaky,
            JobOptions {
                max_failed_attempts: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        queue.push(&job).await.unwrap();
        let worker = worker(queue);

        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Retried);

        let requeued = worker.queue.pop().await.unwrap().expect("job was requeued");
        assert_eq!(requeued.failed_attempts(), 1);
        assert!(!requeued.is_failed());
    }

    #[tokio::test]
    async fn exhausted_job_is_not_requeued() {
        let queue = MemoryQueue::new();
        let job = Job::with_options(
            &Flaky,
            JobOptions {
                max_failed_attempts: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        queue.push(&job).await.unwrap();
        let worker = worker(queue);

        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Retried);
        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Exhausted);
        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn backoff_failure_parks_the_job_until_due() {
        let queue = MemoryQueue::new();
        let job = Job::with_options(
            &Flaky,
            JobOptions {
                max_failed_attempts: Some(3),
                backoff_interval: Some(Duration::from_millis(150)),
                ..Default::default()
            },
        )
        .unwrap();
        queue.push(&job).await.unwrap();
        let worker = worker(queue);

        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Retried);
        // Requeued with execute_at in the future, so the queue looks empty.
        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Idle);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Retried);
    }

    /// Queue stub whose pop violates the due-time contract, to exercise the
    /// worker's defensive re-check.
    #[derive(Default)]
    struct NotDueQueue {
        jobs: Mutex<Vec<Job>>,
        requeued: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Queue for NotDueQueue {
        async fn push(&self, job: &Job) -> crate::Result<()> {
            self.requeued.fetch_add(1, Ordering::SeqCst);
            self.jobs.lock().await.push(job.clone());
            Ok(())
        }

        async fn pop(&self) -> crate::Result<Option<Job>> {
            Ok(self.jobs.lock().await.pop())
        }
    }

    #[tokio::test]
    async fn not_due_job_is_pushed_back_without_running() {
        let queue = NotDueQueue::default();
        let job = Job::with_options(
            &Counted,
            JobOptions {
                execute_at: Some(Utc::now() + chrono::Duration::seconds(60)),
                ..Default::default()
            },
        )
        .unwrap();
        queue.jobs.lock().await.push(job);

        let worker = Worker::new(queue, registry(), WorkerConfig::default());
        assert_eq!(worker.tick().await.unwrap(), TickOutcome::Requeued);
        assert_eq!(worker.queue.requeued.load(Ordering::SeqCst), 1);
    }

    /// Queue stub whose pop always fails, to check that store faults escape
    /// the tick instead of being swallowed.
    struct BrokenQueue;

    #[async_trait::async_trait]
    impl Queue for BrokenQueue {
        async fn push(&self, _job: &Job) -> crate::Result<()> {
            Err(DelayqError::Store("write rejected".to_string()))
        }

        async fn pop(&self) -> crate::Result<Option<Job>> {
            Err(DelayqError::Store("read rejected".to_string()))
        }
    }

    #[tokio::test]
    async fn store_faults_propagate_out_of_tick() {
        let worker = Worker::new(BrokenQueue, registry(), WorkerConfig::default());
        assert!(matches!(
            worker.tick().await,
            Err(DelayqError::Store(_))
        ));
    }

    #[tokio::test]
    async fn run_loop_processes_jobs_until_stopped() {
        let queue = MemoryQueue::new();
        queue.push(&Job::new(&LoopCounted).unwrap()).await.unwrap();
        queue.push(&Job::new(&LoopCounted).unwrap()).await.unwrap();

        let before = LOOP_RUNS.load(Ordering::SeqCst);
        let worker = Arc::new(worker(queue));

        let handle = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.run().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        worker.stop();
        handle.await.unwrap();

        assert_eq!(LOOP_RUNS.load(Ordering::SeqCst), before + 2);
    }
}
