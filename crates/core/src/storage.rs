// Key-value context threaded through a graph execution

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Mutable context read by conditions and written by tasks
///
/// Not synchronized: one execution owns the storage for its whole duration.
pub trait Storage: Send {
    /// Look up a key
    fn get(&self, key: &str) -> Option<&Value>;

    /// Insert or replace a key
    fn set(&mut self, key: String, value: Value);

    /// Remove a key, returning its previous value
    fn remove(&mut self, key: &str) -> Option<Value>;

    /// Look up a key, falling back to `default` when absent
    fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl Storage for HashMap<String, Value> {
    fn get(&self, key: &str) -> Option<&Value> {
        HashMap::get(self, key)
    }

    fn set(&mut self, key: String, value: Value) {
        self.insert(key, value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        HashMap::remove(self, key)
    }
}

impl Storage for BTreeMap<String, Value> {
    fn get(&self, key: &str) -> Option<&Value> {
        BTreeMap::get(self, key)
    }

    fn set(&mut self, key: String, value: Value) {
        self.insert(key, value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        BTreeMap::remove(self, key)
    }
}

impl Storage for serde_json::Map<String, Value> {
    fn get(&self, key: &str) -> Option<&Value> {
        serde_json::Map::get(self, key)
    }

    fn set(&mut self, key: String, value: Value) {
        self.insert(key, value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        serde_json::Map::remove(self, key)
    }
}
