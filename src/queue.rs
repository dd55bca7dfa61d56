// src/queue.rs
use crate::{lua::LuaScripts, DelayqError, Job, Result};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// The push/pop capability a worker is polymorphic over.
///
/// `push` places a job according to its due time: the ready list when it is
/// already runnable, the delayed set otherwise. `pop` migrates due delayed
/// jobs first, then takes the head of the ready list; an empty queue is
/// `Ok(None)`, not an error.
#[async_trait::async_trait]
pub trait Queue: Send + Sync {
    async fn push(&self, job: &Job) -> Result<()>;

    async fn pop(&self) -> Result<Option<Job>>;
}

/// Options for a Redis-backed queue.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "queue".to_string(),
        }
    }
}

/// Redis-backed two-tier queue.
///
/// Ready jobs live in a list (`{prefix}:ready`, RPUSH/LPOP for FIFO) and
/// not-yet-due jobs in a sorted set (`{prefix}:delayed`) scored by their
/// `execute_at` in unix milliseconds. Migration between the tiers runs as a
/// single Lua script so it is atomic even with multiple workers popping.
pub struct RedisQueue {
    conn: ConnectionManager,
    key_prefix: String,
    scripts: LuaScripts,
}

impl RedisQueue {
    /// Connect to Redis and build a queue.
    pub async fn connect(options: QueueOptions) -> Result<Self> {
        let client = redis::Client::open(options.redis_url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self::with_connection(conn, options.key_prefix))
    }

    /// Build a queue over an existing connection manager.
    pub fn with_connection(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            scripts: LuaScripts::new(),
        }
    }

    fn ready_key(&self) -> String {
        format!("{}:ready", self.key_prefix)
    }

    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.key_prefix)
    }

    /// Move every due job from the delayed set to the tail of the ready
    /// list, in ascending `execute_at` order. Returns the number moved.
    async fn migrate_delayed_jobs(&self) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.conn.clone();

        let moved: i64 = self
            .scripts
            .migrate_delayed
            .key(self.delayed_key())
            .key(self.ready_key())
            .arg(now)
            .invoke_async(&mut conn)
            .await?;

        Ok(moved as usize)
    }
}

#[async_trait::async_trait]
impl Queue for RedisQueue {
    async fn push(&self, job: &Job) -> Result<()> {
        let snapshot = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();

        match job.execute_at() {
            Some(execute_at) if !job.is_time_to_run() => {
                let added: i64 = conn
                    .zadd(self.delayed_key(), &snapshot, execute_at.timestamp_millis())
                    .await?;
                if added < 1 {
                    return Err(DelayqError::Store(
                        "delayed set did not accept the job snapshot".to_string(),
                    ));
                }
            }
            _ => {
                let len: i64 = conn.rpush(self.ready_key(), &snapshot).await?;
                if len < 1 {
                    return Err(DelayqError::Store(
                        "ready list did not accept the job snapshot".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    async fn pop(&self) -> Result<Option<Job>> {
        self.migrate_delayed_jobs().await?;

        let mut conn = self.conn.clone();
        let snapshot: Option<String> = conn.lpop(self.ready_key(), None).await?;

        match snapshot {
            Some(snapshot) => Ok(Some(serde_json::from_str(&snapshot)?)),
            None => Ok(None),
        }
    }
}
