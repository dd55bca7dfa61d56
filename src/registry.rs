// src/registry.rs
use crate::Task;
use std::collections::HashMap;

/// Registry of task types, enabling execution dispatch by name.
///
/// A worker can only execute tasks that were registered with it; an unknown
/// name is reported as an execution failure and counts against the job's
/// attempts like any other failure of the payload.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Box<dyn TaskRunner>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Register a task type.
    pub fn register<T: Task>(&mut self) -> &mut Self {
        self.tasks
            .insert(T::name().to_string(), Box::new(TypedTaskRunner::<T>::new()));
        self
    }

    /// Deserialize the payload for `name` and execute it.
    pub async fn run_task(&self, name: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let runner = self
            .tasks
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("task `{}` is not registered", name))?;

        runner.run(payload).await
    }

    /// Registered task names.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn contains_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }
}

#[async_trait::async_trait]
trait TaskRunner: Send + Sync {
    async fn run(&self, payload: serde_json::Value) -> anyhow::Result<()>;
}

struct TypedTaskRunner<T: Task> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Task> TypedTaskRunner<T> {
    fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T: Task> TaskRunner for TypedTaskRunner<T> {
    async fn run(&self, payload: serde_json::Value) -> anyhow::Result<()> {
        let task: T = serde_json::from_value(payload)?;
        task.perform().await
    }
}
