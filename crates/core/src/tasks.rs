// Built-in tasks that operate on storage

use crate::storage::Storage;
use crate::task::Task;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::time::Duration;

/// Storage-manipulating task, serialized with an `op` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StorageTask {
    /// Write a value
    Set { key: String, value: Value },
    /// Add to a numeric value (absent counts as 0)
    Increment {
        key: String,
        #[serde(default = "default_step")]
        by: Value,
    },
    /// Delete a key
    Remove { key: String },
    /// Copy one key to another; absent source copies null
    Copy { from: String, to: String },
    /// Emit a log line
    Log { message: String },
    /// Wait; suspends instead of blocking when run cooperatively
    Sleep { millis: u64 },
    /// Always fail with the given message
    Fail { message: String },
}

fn default_step() -> Value {
    Value::from(1)
}

impl StorageTask {
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn increment(key: impl Into<String>, by: impl Into<Value>) -> Self {
        Self::Increment {
            key: key.into(),
            by: by.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }

    pub fn copy(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Copy {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    pub fn sleep(millis: u64) -> Self {
        Self::Sleep { millis }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
        }
    }

    fn apply(&self, storage: &mut dyn Storage) -> Result<()> {
        match self {
            StorageTask::Set { key, value } => {
                storage.set(key.clone(), value.clone());
            }
            StorageTask::Increment { key, by } => {
                let current = storage.get(key).cloned().unwrap_or_else(|| Value::from(0));
                let updated = add(&current, by)
                    .with_context(|| format!("Cannot increment '{}'", key))?;
                storage.set(key.clone(), updated);
            }
            StorageTask::Remove { key } => {
                storage.remove(key);
            }
            StorageTask::Copy { from, to } => {
                let value = storage.get(from).cloned().unwrap_or(Value::Null);
                storage.set(to.clone(), value);
            }
            StorageTask::Log { message } => {
                tracing::info!("{}", message);
            }
            StorageTask::Sleep { .. } => {}
            StorageTask::Fail { message } => {
                return Err(anyhow!("{}", message));
            }
        }
        Ok(())
    }
}

fn add(current: &Value, by: &Value) -> Result<Value> {
    let (Value::Number(a), Value::Number(b)) = (current, by) else {
        return Err(anyhow!("{} + {} is not numeric", current, by));
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Value::from(sum));
        }
    }

    let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
    Number::from_f64(sum)
        .map(Value::Number)
        .ok_or_else(|| anyhow!("Increment produced a non-finite number"))
}

#[async_trait::async_trait]
impl Task for StorageTask {
    fn run(&mut self, storage: &mut dyn Storage) -> Result<()> {
        if let StorageTask::Sleep { millis } = self {
            std::thread::sleep(Duration::from_millis(*millis));
        }
        self.apply(storage)
    }

    async fn arun(&mut self, storage: &mut dyn Storage) -> Result<()> {
        if let StorageTask::Sleep { millis } = self {
            tokio::time::sleep(Duration::from_millis(*millis)).await;
        }
        self.apply(storage)
    }

    fn dump(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    fn load(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).context("Invalid storage task")
    }
}
