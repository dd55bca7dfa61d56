use delayq::{
    async_trait, Queue, QueueOptions, RedisQueue, Task, TaskRegistry, Worker, WorkerConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize, Deserialize)]
struct SendEmail {
    to: String,
    subject: String,
}

#[async_trait]
impl Task for SendEmail {
    async fn perform(&self) -> anyhow::Result<()> {
        println!("[SendEmail] to={} subject={}", self.to, self.subject);
        Ok(())
    }

    fn name() -> &'static str {
        "SendEmail"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let mut registry = TaskRegistry::new();
    registry.register::<SendEmail>();

    let queue = RedisQueue::connect(QueueOptions::default()).await?;
    let job = delayq::Job::new(&SendEmail {
        to: "user@example.com".into(),
        subject: "hello".into(),
    })?;
    queue.push(&job).await?;

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
