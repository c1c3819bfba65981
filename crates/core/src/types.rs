use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a node within a graph
///
/// Edges refer to their targets through this index instead of holding the
/// node itself, which is what lets a graph contain cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIdx(pub i64);

impl NodeIdx {
    /// Marker for a node that has not been placed in a graph yet
    pub const UNASSIGNED: NodeIdx = NodeIdx(-1);

    pub fn new(idx: i64) -> Self {
        Self(idx)
    }

    pub fn is_assigned(&self) -> bool {
        *self != Self::UNASSIGNED
    }
}

impl Default for NodeIdx {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl From<i64> for NodeIdx {
    fn from(idx: i64) -> Self {
        Self(idx)
    }
}

impl std::fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a single graph execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How tasks are invoked while a graph executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// `Task::run` on the calling thread
    #[default]
    Blocking,
    /// `Task::arun`, awaited
    Cooperative,
}

/// Limits applied to a graph execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Maximum number of nodes executed before the run is aborted (None = unlimited)
    #[serde(default)]
    pub max_steps: Option<u64>,
}

impl ExecutionOptions {
    pub fn with_max_steps(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
        }
    }
}

/// Outcome of a completed graph execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: RunId,
    pub mode: ExecutionMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Executed nodes, in order
    pub path: Vec<NodeIdx>,
}

impl ExecutionReport {
    /// The node the execution terminated on
    pub fn last(&self) -> Option<NodeIdx> {
        self.path.last().copied()
    }

    pub fn steps(&self) -> usize {
        self.path.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_idx_unassigned_default() {
        assert_eq!(NodeIdx::default(), NodeIdx::UNASSIGNED);
        assert!(!NodeIdx::default().is_assigned());
        assert!(NodeIdx::new(0).is_assigned());
    }

    #[test]
    fn test_node_idx_serializes_as_integer() {
        let json = serde_json::to_value(NodeIdx::new(7)).unwrap();
        assert_eq!(json, serde_json::json!(7));

        let idx: NodeIdx = serde_json::from_value(serde_json::json!(-1)).unwrap();
        assert_eq!(idx, NodeIdx::UNASSIGNED);
    }

    #[test]
    fn test_execution_mode_names() {
        let mode: ExecutionMode = serde_json::from_str("\"cooperative\"").unwrap();
        assert_eq!(mode, ExecutionMode::Cooperative);
        assert_eq!(ExecutionMode::default(), ExecutionMode::Blocking);
    }
}
