use delayq::{
    async_trait, Job, JobOptions, Queue, QueueOptions, RedisQueue, Task, TaskRegistry, Worker,
    WorkerConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize, Deserialize)]
struct FlakyJob {
    fail_times: u32,
}

#[async_trait]
impl Task for FlakyJob {
    async fn perform(&self) -> anyhow::Result<()> {
        static ATTEMPTS: AtomicU32 = AtomicU32::new(0);
        let n = ATTEMPTS.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[FlakyJob] attempt {}", n);
        if n <= self.fail_times {
            Err(anyhow::anyhow!("simulated failure"))
        } else {
            Ok(())
        }
    }

    fn name() -> &'static str {
        "FlakyJob"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let queue = RedisQueue::connect(QueueOptions::default()).await?;

    // Fails twice, then succeeds; three attempts allowed, 5s backoff between.
    let job = Job::with_options(
        &FlakyJob { fail_times: 2 },
        JobOptions {
            max_failed_attempts: Some(3),
            backoff_interval: Some(Duration::from_secs(5)),
            ..Default::default()
        },
    )?;
    queue.push(&job).await?;
    println!("[FlakyJob] enqueued");

    let mut registry = TaskRegistry::new();
    registry.register::<FlakyJob>();

    let worker = Arc::new(Worker::new(
        queue,
        Arc::new(registry),
        WorkerConfig::default(),
    ));

    let handle = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run().await })
    };

    tokio::signal::ctrl_c().await?;
    worker.stop();
    handle.await?;
    Ok(())
}
