//! Error types for graph loading and execution.

use crate::types::NodeIdx;

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building, loading, dumping or running a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A condition names an operator that is not registered.
    #[error("Unknown comparison operator: {0}")]
    UnknownOperator(String),

    /// An edge record carries a type tag outside the known set.
    #[error("Unknown edge type: {0}")]
    UnknownEdgeType(String),

    /// A node record carries a type tag outside the known set.
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// An edge points at an index that is not in the node table.
    #[error("Dangling reference: node {from} points to missing node {to}")]
    DanglingReference { from: NodeIdx, to: NodeIdx },

    /// Two nodes share the same index.
    #[error("Duplicate node index: {0}")]
    DuplicateNode(NodeIdx),

    /// A node without an index was used where one is required.
    #[error("Node index is unassigned (-1)")]
    UnassignedIndex,

    /// No free index is left above the highest node.
    #[error("No node index available after {0}")]
    IndexExhausted(NodeIdx),

    /// A plain node record carries a task.
    #[error("Node {0} has type Node but carries a task; use TaskNode")]
    TaskOnPlainNode(NodeIdx),

    /// Lookup of a node that is not part of the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeIdx),

    /// A record is structurally invalid.
    #[error("Malformed {what} record: {source}")]
    MalformedRecord {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A task dump could not be turned back into a task.
    #[error("Failed to load task of node {idx}: {source}")]
    TaskLoad {
        idx: NodeIdx,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A task failed while running; passed through untouched.
    #[error(transparent)]
    Task(anyhow::Error),

    /// The execution visited more nodes than allowed.
    #[error("Execution exceeded the limit of {0} steps")]
    StepLimitExceeded(u64),
}

impl GraphError {
    pub(crate) fn malformed(what: &'static str, source: serde_json::Error) -> Self {
        Self::MalformedRecord { what, source }
    }

    /// Check if this error describes a malformed graph rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownOperator(_)
                | Self::UnknownEdgeType(_)
                | Self::UnknownNodeType(_)
                | Self::DanglingReference { .. }
                | Self::DuplicateNode(_)
                | Self::UnassignedIndex
                | Self::TaskOnPlainNode(_)
                | Self::MalformedRecord { .. }
                | Self::TaskLoad { .. }
        )
    }
}
