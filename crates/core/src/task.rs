use crate::storage::Storage;
use anyhow::Result;
use serde_json::Value;

/// Unit of work attached to a node
///
/// Supplied by the embedding application. Both entry points must have the
/// same observable effect; `arun` may suspend while waiting on external work.
#[async_trait::async_trait]
pub trait Task: Send + Sync {
    /// Execute on the calling thread
    fn run(&mut self, storage: &mut dyn Storage) -> Result<()>;

    /// Execute cooperatively
    async fn arun(&mut self, storage: &mut dyn Storage) -> Result<()> {
        self.run(storage)
    }

    /// Serialize the task's configuration
    fn dump(&self) -> Value;

    /// Rebuild a task from the output of [`Task::dump`]
    fn load(value: &Value) -> Result<Self>
    where
        Self: Sized;
}
