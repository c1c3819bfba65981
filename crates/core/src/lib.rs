//! Declarative execution graphs.
//!
//! A [`Graph`] is an arena of [`Node`]s keyed by [`NodeIdx`]. Each node may
//! carry a [`Task`] and an outgoing [`Edge`]; running a node executes its task
//! against the shared [`Storage`] and lets the edge pick the successor.
//! Graphs dump to a flat, index-referenced list of [`NodeRecord`]s and load
//! back in two passes, so cyclic graphs round-trip safely.

pub mod error;
pub mod graph;
pub mod storage;
pub mod task;
pub mod tasks;
pub mod types;

pub use error::{GraphError, Result};
pub use graph::{
    Combine, Condition, ConditionRecord, Edge, EdgeRecord, Graph, Node, NodeKind, NodeRecord,
    Operator, OperatorRegistry, Route,
};
pub use storage::Storage;
pub use task::Task;
pub use tasks::StorageTask;
pub use types::*;
