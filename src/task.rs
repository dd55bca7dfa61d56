// src/task.rs
use serde::{de::DeserializeOwned, Serialize};

/// The work a job carries: "execute given my stored payload".
///
/// One implementation per job type. The payload is the implementing struct
/// itself; it is serialized into the job snapshot on push and rebuilt from it
/// before execution, so everything the work needs must round-trip through
/// serde.
#[async_trait::async_trait]
pub trait Task: Send + Sync + 'static + Serialize + DeserializeOwned {
    /// Execute the work. An `Err` counts as one failed attempt against the
    /// owning job's retry budget.
    async fn perform(&self) -> anyhow::Result<()>;

    /// Type identity stored in the snapshot, used to dispatch the right
    /// implementation on deserialization.
    fn name() -> &'static str
    where
        Self: Sized;
}
