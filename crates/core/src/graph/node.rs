use super::edge::Edge;
use super::operator::OperatorRegistry;
use crate::error::{GraphError, Result};
use crate::storage::Storage;
use crate::task::Task;
use crate::types::{ExecutionMode, NodeIdx};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node type tags accepted when loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Pure routing node, never carries a task
    Plain,
    /// Node that may carry a task
    Task,
}

impl NodeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Plain => "Node",
            NodeKind::Task => "TaskNode",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "Node" => Ok(NodeKind::Plain),
            "TaskNode" => Ok(NodeKind::Task),
            other => Err(GraphError::UnknownNodeType(other.to_string())),
        }
    }
}

/// Serialized form of a [`Node`]
///
/// The edge stays a raw value so that its type tag can be checked before
/// any of its fields are parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub idx: NodeIdx,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<Value>,
}

/// A graph vertex: identity, optional task, optional outgoing edge
#[derive(Debug)]
pub struct Node<T> {
    pub idx: NodeIdx,
    pub task: Option<T>,
    pub edge: Option<Edge>,
    kind: NodeKind,
}

impl<T: Task> Node<T> {
    pub fn new(idx: i64) -> Self {
        Self::at(NodeIdx(idx))
    }

    pub fn at(idx: NodeIdx) -> Self {
        Self {
            idx,
            task: None,
            edge: None,
            kind: NodeKind::Plain,
        }
    }

    /// Node whose index is assigned when it is pushed into a graph
    pub fn unassigned() -> Self {
        Self::at(NodeIdx::UNASSIGNED)
    }

    pub fn with_task(mut self, task: T) -> Self {
        self.task = Some(task);
        self.kind = NodeKind::Task;
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Tag written on dump; a node that ever held a task stays a `TaskNode`
    pub fn kind(&self) -> NodeKind {
        if self.task.is_some() {
            NodeKind::Task
        } else {
            self.kind
        }
    }

    /// Run the task, then decide where to go next. None = terminal.
    pub fn run(&mut self, storage: &mut dyn Storage) -> Result<Option<NodeIdx>> {
        futures::executor::block_on(self.execute(storage, ExecutionMode::Blocking))
    }

    /// Cooperative counterpart of [`Node::run`]
    pub async fn arun(&mut self, storage: &mut dyn Storage) -> Result<Option<NodeIdx>> {
        self.execute(storage, ExecutionMode::Cooperative).await
    }

    pub(crate) async fn execute(
        &mut self,
        storage: &mut dyn Storage,
        mode: ExecutionMode,
    ) -> Result<Option<NodeIdx>> {
        if let Some(task) = self.task.as_mut() {
            let outcome = match mode {
                ExecutionMode::Blocking => task.run(storage),
                ExecutionMode::Cooperative => task.arun(storage).await,
            };
            outcome.map_err(GraphError::Task)?;
        }

        let next = match &self.edge {
            Some(edge) => {
                let next = edge.next(storage);
                if next.is_none() {
                    tracing::debug!(
                        "Node {} {} edge resolved to no target, stopping",
                        self.idx,
                        edge.type_tag()
                    );
                }
                next
            }
            None => None,
        };

        Ok(next)
    }

    /// Serialize the node; edge targets are written as indices only
    pub fn dump(&self) -> NodeRecord {
        NodeRecord {
            idx: self.idx,
            kind: self.kind().tag().to_string(),
            task: self.task.as_ref().map(Task::dump),
            edge: self.edge.as_ref().map(Edge::to_value),
        }
    }

    /// First load pass: identity and task only, edge left unresolved
    pub fn load_fields(record: &NodeRecord) -> Result<Self> {
        if !record.idx.is_assigned() {
            return Err(GraphError::UnassignedIndex);
        }

        let kind = NodeKind::from_tag(&record.kind)?;
        let task = match (kind, &record.task) {
            (NodeKind::Task, Some(value)) => {
                Some(T::load(value).map_err(|source| GraphError::TaskLoad {
                    idx: record.idx,
                    source: source.into(),
                })?)
            }
            (NodeKind::Plain, Some(_)) => return Err(GraphError::TaskOnPlainNode(record.idx)),
            (_, None) => None,
        };

        Ok(Self {
            idx: record.idx,
            task,
            edge: None,
            kind,
        })
    }

    /// Second load pass: rebuild the edge from the record
    pub fn load_edge(&mut self, record: &NodeRecord, operators: &OperatorRegistry) -> Result<()> {
        self.edge = record
            .edge
            .as_ref()
            .map(|value| Edge::from_value(value, operators))
            .transpose()?;
        Ok(())
    }
}
