pub mod arena;
pub mod condition;
pub mod edge;
mod executor;
pub mod node;
pub mod operator;

pub use arena::Graph;
pub use condition::{Condition, ConditionRecord};
pub use edge::{Combine, Edge, EdgeRecord, Route, EDGE_TYPES};
pub use node::{Node, NodeKind, NodeRecord};
pub use operator::{Operator, OperatorRegistry, Predicate};
