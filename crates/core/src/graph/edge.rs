use super::condition::{Condition, ConditionRecord};
use super::operator::OperatorRegistry;
use crate::error::{GraphError, Result};
use crate::storage::Storage;
use crate::types::NodeIdx;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Edge type tags accepted when loading
pub const EDGE_TYPES: &[&str] = &["SimpleEdge", "IfElseEdge", "RouteEdge"];

/// How the conditions of an if/else edge are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    /// Every condition must hold; an empty list holds
    #[default]
    And,
    /// Any condition must hold; an empty list does not hold
    Or,
}

impl Combine {
    /// Short-circuits on the first deciding condition
    pub fn evaluate(&self, conditions: &[Condition], storage: &dyn Storage) -> bool {
        match self {
            Combine::And => conditions.iter().all(|c| c.evaluate(storage)),
            Combine::Or => conditions.iter().any(|c| c.evaluate(storage)),
        }
    }
}

/// One entry of a route edge
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub condition: Condition,
    pub target: NodeIdx,
}

/// Transition rule out of a node
///
/// Targets are node indices; an edge never owns the nodes it points at.
/// A missing target means execution ends at the current node.
#[derive(Debug, Clone, PartialEq)]
pub enum Edge {
    /// Unconditional advance
    Simple { next: Option<NodeIdx> },
    /// Binary branch over combined conditions
    IfElse {
        conditions: Vec<Condition>,
        combine: Combine,
        true_branch: Option<NodeIdx>,
        false_branch: Option<NodeIdx>,
    },
    /// Ordered routes, first match wins
    Route {
        routes: Vec<Route>,
        default: Option<NodeIdx>,
    },
}

/// Serialized form of an [`Edge`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EdgeRecord {
    #[serde(rename = "SimpleEdge")]
    Simple {
        #[serde(default)]
        node_idx: Option<NodeIdx>,
    },
    #[serde(rename = "IfElseEdge")]
    IfElse {
        #[serde(default)]
        conditions: Vec<ConditionRecord>,
        #[serde(default)]
        combine: Combine,
        #[serde(default)]
        true_idx: Option<NodeIdx>,
        #[serde(default)]
        false_idx: Option<NodeIdx>,
    },
    #[serde(rename = "RouteEdge")]
    Route {
        #[serde(default, alias = "conditions")]
        routes: Vec<(ConditionRecord, NodeIdx)>,
        #[serde(default)]
        default_node: Option<NodeIdx>,
    },
}

impl Edge {
    pub fn simple(next: NodeIdx) -> Self {
        Edge::Simple { next: Some(next) }
    }

    pub fn if_else(
        conditions: Vec<Condition>,
        combine: Combine,
        true_branch: Option<NodeIdx>,
        false_branch: Option<NodeIdx>,
    ) -> Self {
        Edge::IfElse {
            conditions,
            combine,
            true_branch,
            false_branch,
        }
    }

    pub fn route(routes: Vec<(Condition, NodeIdx)>, default: Option<NodeIdx>) -> Self {
        Edge::Route {
            routes: routes
                .into_iter()
                .map(|(condition, target)| Route { condition, target })
                .collect(),
            default,
        }
    }

    /// Type tag written into the serialized record
    pub fn type_tag(&self) -> &'static str {
        match self {
            Edge::Simple { .. } => "SimpleEdge",
            Edge::IfElse { .. } => "IfElseEdge",
            Edge::Route { .. } => "RouteEdge",
        }
    }

    /// Decide the next node for the current storage, None = terminal
    pub fn next(&self, storage: &dyn Storage) -> Option<NodeIdx> {
        match self {
            Edge::Simple { next } => *next,
            Edge::IfElse {
                conditions,
                combine,
                true_branch,
                false_branch,
            } => {
                if combine.evaluate(conditions, storage) {
                    *true_branch
                } else {
                    *false_branch
                }
            }
            Edge::Route { routes, default } => routes
                .iter()
                .find(|route| route.condition.evaluate(storage))
                .map(|route| route.target)
                .or(*default),
        }
    }

    /// Every node directly reachable through this edge
    pub fn get_nodes(&self) -> Vec<NodeIdx> {
        match self {
            Edge::Simple { next } => next.iter().copied().collect(),
            Edge::IfElse {
                true_branch,
                false_branch,
                ..
            } => true_branch.iter().chain(false_branch.iter()).copied().collect(),
            Edge::Route { routes, default } => routes
                .iter()
                .map(|route| route.target)
                .chain(default.iter().copied())
                .collect(),
        }
    }

    pub fn dump(&self) -> EdgeRecord {
        match self {
            Edge::Simple { next } => EdgeRecord::Simple { node_idx: *next },
            Edge::IfElse {
                conditions,
                combine,
                true_branch,
                false_branch,
            } => EdgeRecord::IfElse {
                conditions: conditions.iter().map(Condition::dump).collect(),
                combine: *combine,
                true_idx: *true_branch,
                false_idx: *false_branch,
            },
            Edge::Route { routes, default } => EdgeRecord::Route {
                routes: routes
                    .iter()
                    .map(|route| (route.condition.dump(), route.target))
                    .collect(),
                default_node: *default,
            },
        }
    }

    pub fn load(record: &EdgeRecord, operators: &OperatorRegistry) -> Result<Self> {
        let edge = match record {
            EdgeRecord::Simple { node_idx } => Edge::Simple { next: *node_idx },
            EdgeRecord::IfElse {
                conditions,
                combine,
                true_idx,
                false_idx,
            } => Edge::IfElse {
                conditions: conditions
                    .iter()
                    .map(|c| Condition::load(c, operators))
                    .collect::<Result<_>>()?,
                combine: *combine,
                true_branch: *true_idx,
                false_branch: *false_idx,
            },
            EdgeRecord::Route {
                routes,
                default_node,
            } => Edge::Route {
                routes: routes
                    .iter()
                    .map(|(c, target)| {
                        Ok(Route {
                            condition: Condition::load(c, operators)?,
                            target: *target,
                        })
                    })
                    .collect::<Result<_>>()?,
                default: *default_node,
            },
        };

        if edge.get_nodes().iter().any(|idx| !idx.is_assigned()) {
            return Err(GraphError::UnassignedIndex);
        }

        Ok(edge)
    }

    /// Load from a raw JSON value, rejecting unknown type tags before parsing fields
    pub fn from_value(value: &Value, operators: &OperatorRegistry) -> Result<Self> {
        let tag = value.get("type").and_then(Value::as_str).ok_or_else(|| {
            GraphError::malformed(
                "edge",
                <serde_json::Error as serde::de::Error>::missing_field("type"),
            )
        })?;

        if !EDGE_TYPES.contains(&tag) {
            return Err(GraphError::UnknownEdgeType(tag.to_string()));
        }

        let record: EdgeRecord = serde_json::from_value(value.clone())
            .map_err(|e| GraphError::malformed("edge", e))?;
        Self::load(&record, operators)
    }

    pub fn to_value(&self) -> Value {
        // EdgeRecord only holds strings, integers and JSON values
        serde_json::to_value(self.dump()).unwrap_or(Value::Null)
    }
}
