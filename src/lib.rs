// src/lib.rs
//! delayq: a minimal Redis-backed delayed job queue
//!
//! Producers push jobs that are runnable immediately or at a future instant;
//! a worker loop pops and runs them, applying a bounded-retry-with-backoff
//! policy on failure. Ready jobs live in a Redis list, delayed jobs in a
//! sorted set scored by due time, and due jobs migrate between the two
//! atomically on every pop.

pub mod error;
pub mod job;
pub mod lua;
pub mod memory;
pub mod queue;
pub mod registry;
pub mod task;
pub mod worker;

pub use error::{DelayqError, Result, StateError};
pub use job::{Job, JobOptions, RunOutcome};
pub use memory::MemoryQueue;
pub use queue::{Queue, QueueOptions, RedisQueue};
pub use registry::TaskRegistry;
pub use task::Task;
pub use worker::{TickOutcome, Worker, WorkerConfig};

// Re-export commonly used types
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
