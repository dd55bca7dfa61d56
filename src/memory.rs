// src/memory.rs
use crate::{Job, Queue, Result};
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::Mutex;

/// In-process queue implementing the same two-tier protocol as [`RedisQueue`].
///
/// Jobs are stored as serialized snapshots, exactly as the Redis backend
/// stores them, so the serde round-trip is exercised on every push/pop.
/// Intended for tests and demos that should not depend on a live Redis;
/// state is lost when the queue is dropped.
///
/// [`RedisQueue`]: crate::RedisQueue
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    ready: VecDeque<String>,
    // Keyed by (execute_at millis, insertion sequence) so equal due times
    // migrate in insertion order.
    delayed: BTreeMap<(i64, u64), String>,
    seq: u64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Queue for MemoryQueue {
    async fn push(&self, job: &Job) -> Result<()> {
        let snapshot = serde_json::to_string(job)?;
        let mut inner = self.inner.lock().await;

        match job.execute_at() {
            Some(execute_at) if !job.is_time_to_run() => {
                let seq = inner.seq;
                inner.seq += 1;
                inner
                    .delayed
                    .insert((execute_at.timestamp_millis(), seq), snapshot);
            }
            _ => inner.ready.push_back(snapshot),
        }

        Ok(())
    }

    async fn pop(&self) -> Result<Option<Job>> {
        let mut inner = self.inner.lock().await;

        let now = Utc::now().timestamp_millis();
        let due: Vec<(i64, u64)> = inner
            .delayed
            .range(..=(now, u64::MAX))
            .map(|(key, _)| *key)
            .collect();

        for key in due {
            if let Some(snapshot) = inner.delayed.remove(&key) {
                inner.ready.push_back(snapshot);
            }
        }

        match inner.ready.pop_front() {
            Some(snapshot) => Ok(Some(serde_json::from_str(&snapshot)?)),
            None => Ok(None),
        }
    }
}
