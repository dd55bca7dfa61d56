use delayq::{
    async_trait, Job, JobOptions, Queue, QueueOptions, RedisQueue, Task, TaskRegistry, Worker,
    WorkerConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize, Deserialize)]
struct NotifyUser {
    user_id: String,
}

#[async_trait]
impl Task for NotifyUser {
    async fn perform(&self) -> anyhow::Result<()> {
        println!("[NotifyUser] notifying user_id={}", self.user_id);
        Ok(())
    }

    fn name() -> &'static str {
        "NotifyUser"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let queue = RedisQueue::connect(QueueOptions::default()).await?;

    // One job due now, one due in ten seconds.
    let now = Job::new(&NotifyUser {
        user_id: "u1".into(),
    })?;
    let later = Job::with_options(
        &NotifyUser {
            user_id: "u2".into(),
        },
        JobOptions {
            execute_at: Some(chrono::Utc::now() + chrono::Duration::seconds(10)),
            ..Default::default()
        },
    )?;
    queue.push(&now).await?;
    queue.push(&later).await?;
    println!("enqueued u1 (due now) and u2 (due in 10s)");

    let mut registry = TaskRegistry::new();
    registry.register::<NotifyUser>();

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
