use super::node::{Node, NodeRecord};
use super::operator::OperatorRegistry;
use crate::error::{GraphError, Result};
use crate::task::Task;
use crate::types::{ExecutionOptions, NodeIdx};
use petgraph::graph::DiGraph;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Arena owning every node of a graph, keyed by index
///
/// Edges hold indices; resolving them to nodes always goes through the arena.
#[derive(Debug)]
pub struct Graph<T> {
    nodes: BTreeMap<NodeIdx, Node<T>>,
    pub(crate) options: ExecutionOptions,
}

impl<T: Task> Graph<T> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ExecutionOptions {
        self.options
    }

    /// Add a node under its own index
    pub fn insert(&mut self, node: Node<T>) -> Result<NodeIdx> {
        let idx = node.idx;
        if !idx.is_assigned() {
            return Err(GraphError::UnassignedIndex);
        }
        if self.nodes.contains_key(&idx) {
            return Err(GraphError::DuplicateNode(idx));
        }
        self.nodes.insert(idx, node);
        Ok(idx)
    }

    /// Add a node, assigning the next free index if it has none
    pub fn push(&mut self, mut node: Node<T>) -> Result<NodeIdx> {
        if !node.idx.is_assigned() {
            node.idx = self.next_idx()?;
        }
        self.insert(node)
    }

    /// Smallest assignable index above every node in the graph
    pub fn next_idx(&self) -> Result<NodeIdx> {
        let Some(last) = self.nodes.keys().next_back().copied() else {
            return Ok(NodeIdx(0));
        };
        match last.0.checked_add(1) {
            Some(next) if next == NodeIdx::UNASSIGNED.0 => Ok(NodeIdx(0)),
            Some(next) => Ok(NodeIdx(next)),
            None => Err(GraphError::IndexExhausted(last)),
        }
    }

    pub fn node(&self, idx: NodeIdx) -> Option<&Node<T>> {
        self.nodes.get(&idx)
    }

    pub fn node_mut(&mut self, idx: NodeIdx) -> Option<&mut Node<T>> {
        self.nodes.get_mut(&idx)
    }

    pub(crate) fn require_mut(&mut self, from: Option<NodeIdx>, idx: NodeIdx) -> Result<&mut Node<T>> {
        self.nodes.get_mut(&idx).ok_or(match from {
            Some(from) => GraphError::DanglingReference { from, to: idx },
            None => GraphError::NodeNotFound(idx),
        })
    }

    pub fn contains(&self, idx: NodeIdx) -> bool {
        self.nodes.contains_key(&idx)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node indices in ascending order
    pub fn indices(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        self.nodes.keys().copied()
    }

    /// Default entry point: the lowest index
    pub fn entry(&self) -> Option<NodeIdx> {
        self.nodes.keys().next().copied()
    }

    /// Check that every edge target exists
    pub fn validate(&self) -> Result<()> {
        for node in self.nodes.values() {
            if let Some(edge) = &node.edge {
                for target in edge.get_nodes() {
                    if !self.nodes.contains_key(&target) {
                        return Err(GraphError::DanglingReference {
                            from: node.idx,
                            to: target,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Indices reachable from `start` (including it), ascending
    pub fn reachable(&self, start: NodeIdx) -> Result<Vec<NodeIdx>> {
        let mut visited = BTreeSet::new();
        self.walk(start, |node| {
            visited.insert(node.idx);
        })?;
        Ok(visited.into_iter().collect())
    }

    /// Depth-first traversal visiting each reachable node once
    fn walk<F>(&self, start: NodeIdx, mut visit: F) -> Result<()>
    where
        F: FnMut(&Node<T>),
    {
        if !self.nodes.contains_key(&start) {
            return Err(GraphError::NodeNotFound(start));
        }

        let mut seen = BTreeSet::from([start]);
        let mut stack = vec![start];

        while let Some(idx) = stack.pop() {
            let node = self
                .nodes
                .get(&idx)
                .ok_or(GraphError::NodeNotFound(idx))?;
            visit(node);

            let targets = node.edge.as_ref().map(|e| e.get_nodes()).unwrap_or_default();
            for target in targets.into_iter().rev() {
                if !self.nodes.contains_key(&target) {
                    return Err(GraphError::DanglingReference { from: idx, to: target });
                }
                if seen.insert(target) {
                    stack.push(target);
                }
            }
        }

        Ok(())
    }

    /// Whether the subgraph reachable from `start` contains a cycle
    pub fn is_cyclic(&self, start: NodeIdx) -> Result<bool> {
        let reachable = self.reachable(start)?;
        let mut graph: DiGraph<NodeIdx, ()> = DiGraph::new();
        let positions: HashMap<NodeIdx, _> = reachable
            .iter()
            .map(|idx| (*idx, graph.add_node(*idx)))
            .collect();

        for idx in &reachable {
            let targets = self
                .nodes
                .get(idx)
                .and_then(|node| node.edge.as_ref())
                .map(|edge| edge.get_nodes())
                .unwrap_or_default();
            for target in targets {
                if let (Some(from), Some(to)) = (positions.get(idx), positions.get(&target)) {
                    graph.update_edge(*from, *to, ());
                }
            }
        }

        Ok(petgraph::algo::is_cyclic_directed(&graph))
    }

    /// Serialize every node reachable from `start`, one record per index,
    /// sorted by index
    pub fn dump(&self, start: NodeIdx) -> Result<Vec<NodeRecord>> {
        let mut records: BTreeMap<NodeIdx, NodeRecord> = BTreeMap::new();
        self.walk(start, |node| {
            records.entry(node.idx).or_insert_with(|| node.dump());
        })?;
        Ok(records.into_values().collect())
    }

    /// Serialize every node in the arena, reachable or not
    pub fn dump_all(&self) -> Vec<NodeRecord> {
        self.nodes.values().map(Node::dump).collect()
    }

    /// Rebuild a graph from records with the built-in operators
    pub fn load(records: &[NodeRecord]) -> Result<Self> {
        Self::load_with(records, &OperatorRegistry::new())
    }

    /// Rebuild a graph from records
    ///
    /// Two passes: nodes first (identity and task), then edges bound against
    /// the complete index table.
    pub fn load_with(records: &[NodeRecord], operators: &OperatorRegistry) -> Result<Self> {
        let mut graph = Self::new();

        for record in records {
            graph.insert(Node::load_fields(record)?)?;
        }

        for record in records {
            let node = graph.require_mut(None, record.idx)?;
            node.load_edge(record, operators)?;
        }

        graph.validate()?;

        tracing::debug!("Loaded graph with {} nodes", graph.len());

        Ok(graph)
    }

    pub fn to_json(&self, start: NodeIdx) -> Result<String> {
        let records = self.dump(start)?;
        serde_json::to_string_pretty(&records).map_err(|e| GraphError::malformed("graph", e))
    }

    pub fn from_json(json: &str, operators: &OperatorRegistry) -> Result<Self> {
        let records: Vec<NodeRecord> =
            serde_json::from_str(json).map_err(|e| GraphError::malformed("graph", e))?;
        Self::load_with(&records, operators)
    }
}

impl<T: Task> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::condition::Condition;
    use crate::graph::edge::{Combine, Edge};
    use crate::tasks::StorageTask;
    use serde_json::json;

    fn cyclic_graph() -> Graph<StorageTask> {
        // 0 -> 1 -> 2 -> (0 | 3)
        let mut graph = Graph::new();
        graph
            .insert(
                Node::new(0)
                    .with_task(StorageTask::increment("laps", 1))
                    .with_edge(Edge::simple(NodeIdx(1))),
            )
            .unwrap();
        graph
            .insert(Node::new(1).with_edge(Edge::simple(NodeIdx(2))))
            .unwrap();
        graph
            .insert(Node::new(2).with_edge(Edge::if_else(
                vec![Condition::new("laps", 0, crate::graph::Operator::lt(), 3)],
                Combine::And,
                Some(NodeIdx(0)),
                Some(NodeIdx(3)),
            )))
            .unwrap();
        graph
            .insert(Node::new(3).with_task(StorageTask::set("done", true)))
            .unwrap();
        graph
    }

    #[test]
    fn test_insert_rejects_duplicates_and_unassigned() {
        let mut graph: Graph<StorageTask> = Graph::new();
        graph.insert(Node::new(0)).unwrap();

        assert!(matches!(
            graph.insert(Node::new(0)),
            Err(GraphError::DuplicateNode(NodeIdx(0)))
        ));
        assert!(matches!(
            graph.insert(Node::unassigned()),
            Err(GraphError::UnassignedIndex)
        ));
    }

    #[test]
    fn test_push_assigns_indices() {
        let mut graph: Graph<StorageTask> = Graph::new();

        assert_eq!(graph.push(Node::unassigned()).unwrap(), NodeIdx(0));
        assert_eq!(graph.push(Node::new(10)).unwrap(), NodeIdx(10));
        assert_eq!(graph.push(Node::unassigned()).unwrap(), NodeIdx(11));
        assert_eq!(graph.entry(), Some(NodeIdx(0)));
    }

    #[test]
    fn test_push_at_index_bounds() {
        let mut negative: Graph<StorageTask> = Graph::new();
        negative.insert(Node::new(-2)).unwrap();
        assert_eq!(negative.push(Node::unassigned()).unwrap(), NodeIdx(0));

        let mut full: Graph<StorageTask> = Graph::new();
        full.insert(Node::new(i64::MAX)).unwrap();
        assert!(matches!(
            full.push(Node::unassigned()),
            Err(GraphError::IndexExhausted(NodeIdx(i64::MAX)))
        ));
        assert_eq!(full.len(), 1);
    }

    #[test]
    fn test_validate_detects_dangling_edge() {
        let mut graph: Graph<StorageTask> = Graph::new();
        graph
            .insert(Node::new(0).with_edge(Edge::simple(NodeIdx(7))))
            .unwrap();

        assert!(matches!(
            graph.validate(),
            Err(GraphError::DanglingReference { from: NodeIdx(0), to: NodeIdx(7) })
        ));
    }

    #[test]
    fn test_dump_cyclic_graph_terminates() {
        let graph = cyclic_graph();
        let records = graph.dump(NodeIdx(0)).unwrap();

        let indices: Vec<NodeIdx> = records.iter().map(|r| r.idx).collect();
        assert_eq!(indices, vec![NodeIdx(0), NodeIdx(1), NodeIdx(2), NodeIdx(3)]);
    }

    #[test]
    fn test_dump_from_middle_is_sorted() {
        let graph = cyclic_graph();
        let records = graph.dump(NodeIdx(2)).unwrap();

        let indices: Vec<i64> = records.iter().map(|r| r.idx.0).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_dump_skips_unreachable_nodes() {
        let mut graph = cyclic_graph();
        graph.insert(Node::new(99)).unwrap();

        assert_eq!(graph.dump(NodeIdx(0)).unwrap().len(), 4);
        assert_eq!(graph.dump_all().len(), 5);
    }

    #[test]
    fn test_load_dump_round_trip() {
        let graph = cyclic_graph();
        let records = graph.dump(NodeIdx(0)).unwrap();

        let loaded: Graph<StorageTask> = Graph::load(&records).unwrap();

        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.dump(NodeIdx(0)).unwrap(), records);
    }

    #[test]
    fn test_load_cyclic_json() {
        let json = json!([
            {"idx": 0, "type": "Node", "edge": {"type": "SimpleEdge", "node_idx": 1}},
            {"idx": 1, "type": "Node", "edge": {"type": "SimpleEdge", "node_idx": 0}}
        ]);

        let graph: Graph<StorageTask> =
            Graph::from_json(&json.to_string(), &OperatorRegistry::new()).unwrap();

        assert!(graph.is_cyclic(NodeIdx(0)).unwrap());
        assert_eq!(graph.reachable(NodeIdx(1)).unwrap(), vec![NodeIdx(0), NodeIdx(1)]);
    }

    #[test]
    fn test_load_dangling_reference() {
        let records: Vec<NodeRecord> = serde_json::from_value(json!([
            {"idx": 0, "type": "Node", "edge": {"type": "SimpleEdge", "node_idx": 5}}
        ]))
        .unwrap();

        let result = Graph::<StorageTask>::load(&records);
        assert!(matches!(
            result,
            Err(GraphError::DanglingReference { from: NodeIdx(0), to: NodeIdx(5) })
        ));
    }

    #[test]
    fn test_load_unknown_edge_type() {
        let records: Vec<NodeRecord> = serde_json::from_value(json!([
            {"idx": 0, "type": "Node", "edge": {"type": "BogusEdge", "node_idx": 0}}
        ]))
        .unwrap();

        let err = Graph::<StorageTask>::load(&records).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, GraphError::UnknownEdgeType(tag) if tag == "BogusEdge"));
    }

    #[test]
    fn test_load_duplicate_idx() {
        let records: Vec<NodeRecord> = serde_json::from_value(json!([
            {"idx": 1, "type": "Node"},
            {"idx": 1, "type": "Node"}
        ]))
        .unwrap();

        assert!(matches!(
            Graph::<StorageTask>::load(&records),
            Err(GraphError::DuplicateNode(NodeIdx(1)))
        ));
    }

    #[test]
    fn test_load_with_custom_operator() {
        let mut operators = OperatorRegistry::new();
        operators.register("even", |left, _| left.as_i64().is_some_and(|n| n % 2 == 0));

        let records: Vec<NodeRecord> = serde_json::from_value(json!([
            {"idx": 0, "type": "Node", "edge": {
                "type": "IfElseEdge",
                "conditions": [{"name": "n", "val": 0, "func": "even"}],
                "true_idx": 1
            }},
            {"idx": 1, "type": "Node"}
        ]))
        .unwrap();

        assert!(Graph::<StorageTask>::load_with(&records, &operators).is_ok());
        assert!(matches!(
            Graph::<StorageTask>::load(&records),
            Err(GraphError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_acyclic_graph() {
        let mut graph: Graph<StorageTask> = Graph::new();
        graph
            .insert(Node::new(0).with_edge(Edge::route(
                vec![(Condition::equals("s", "a"), NodeIdx(1))],
                Some(NodeIdx(2)),
            )))
            .unwrap();
        graph.insert(Node::new(1)).unwrap();
        graph
            .insert(Node::new(2).with_edge(Edge::simple(NodeIdx(1))))
            .unwrap();

        assert!(!graph.is_cyclic(NodeIdx(0)).unwrap());
    }
}
