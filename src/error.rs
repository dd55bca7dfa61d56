// src/error.rs
use thiserror::Error;

/// A `run()` precondition violation.
///
/// These indicate caller misuse: under correct worker operation the only one
/// that can legitimately surface is `NotDue`, via the worker's defensive
/// re-check after a pop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("job `{0}` must not be executed before its scheduled time")]
    NotDue(String),

    #[error("job `{0}` is already completed")]
    AlreadyCompleted(String),

    #[error("job `{0}` has exhausted its failed attempts")]
    AlreadyFailed(String),
}

#[derive(Debug, Error)]
pub enum DelayqError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store did not acknowledge write: {0}")]
    Store(String),

    #[error(transparent)]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, DelayqError>;
