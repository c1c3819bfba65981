use super::arena::Graph;
use crate::error::{GraphError, Result};
use crate::storage::Storage;
use crate::task::Task;
use crate::types::{ExecutionMode, ExecutionReport, NodeIdx, RunId};

impl<T: Task> Graph<T> {
    /// Execute from `start` on the calling thread until a node has no successor
    pub fn run(&mut self, start: NodeIdx, storage: &mut dyn Storage) -> Result<ExecutionReport> {
        futures::executor::block_on(self.drive(start, storage, ExecutionMode::Blocking))
    }

    /// Execute from `start`, awaiting each task's cooperative entry point
    pub async fn arun(
        &mut self,
        start: NodeIdx,
        storage: &mut dyn Storage,
    ) -> Result<ExecutionReport> {
        self.drive(start, storage, ExecutionMode::Cooperative).await
    }

    /// Traversal shared by both modes
    pub async fn drive(
        &mut self,
        start: NodeIdx,
        storage: &mut dyn Storage,
        mode: ExecutionMode,
    ) -> Result<ExecutionReport> {
        let run_id = RunId::new();
        let started_at = chrono::Utc::now();
        let max_steps = self.options.max_steps;

        tracing::info!(
            "Starting graph execution: run_id={}, start={}, mode={:?}",
            run_id,
            start,
            mode
        );

        let mut path = Vec::new();
        let mut previous: Option<NodeIdx> = None;
        let mut current = Some(start);

        while let Some(idx) = current {
            if let Some(limit) = max_steps {
                if path.len() as u64 >= limit {
                    tracing::warn!(
                        "Graph execution aborted after {} steps: run_id={}",
                        limit,
                        run_id
                    );
                    return Err(GraphError::StepLimitExceeded(limit));
                }
            }

            let node = self.require_mut(previous, idx)?;
            tracing::debug!("Executing node {}: run_id={}", idx, run_id);

            let next = match node.execute(storage, mode).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(
                        "Graph execution failed at node {}: run_id={}, error={}",
                        idx,
                        run_id,
                        e
                    );
                    return Err(e);
                }
            };
            path.push(idx);

            if let Some(next) = next {
                tracing::debug!("Transition {} -> {}", idx, next);
            }
            previous = Some(idx);
            current = next;
        }

        tracing::info!(
            "Graph execution completed: run_id={}, steps={}",
            run_id,
            path.len()
        );

        Ok(ExecutionReport {
            run_id,
            mode,
            started_at,
            finished_at: chrono::Utc::now(),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{Combine, Condition, Edge, Graph, Node, Operator};
    use crate::tasks::StorageTask;
    use crate::types::{ExecutionMode, ExecutionOptions, NodeIdx};
    use crate::GraphError;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn storage(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    /// 0: route on status -> 1 (A) | 2 (B) | 3 (default)
    fn router() -> Graph<StorageTask> {
        let mut graph = Graph::new();
        graph
            .insert(Node::new(0).with_edge(Edge::route(
                vec![
                    (Condition::equals("status", "A"), NodeIdx(1)),
                    (Condition::equals("status", "B"), NodeIdx(2)),
                ],
                Some(NodeIdx(3)),
            )))
            .unwrap();
        for (idx, label) in [(1, "a"), (2, "b"), (3, "c")] {
            graph
                .insert(Node::new(idx).with_task(StorageTask::set("visited", label)))
                .unwrap();
        }
        graph
    }

    /// Counts `n` up to 3 through a cycle, then finishes on node 2
    fn counter() -> Graph<StorageTask> {
        let mut graph = Graph::new();
        graph
            .insert(
                Node::new(0)
                    .with_task(StorageTask::increment("n", 1))
                    .with_edge(Edge::simple(NodeIdx(1))),
            )
            .unwrap();
        graph
            .insert(Node::new(1).with_edge(Edge::if_else(
                vec![Condition::new("n", 0, Operator::lt(), 3)],
                Combine::And,
                Some(NodeIdx(0)),
                Some(NodeIdx(2)),
            )))
            .unwrap();
        graph
            .insert(Node::new(2).with_task(StorageTask::set("done", true)))
            .unwrap();
        graph
    }

    #[test]
    fn test_route_first_match() {
        let mut graph = router();

        let mut a = storage(json!({"status": "A"}));
        let report = graph.run(NodeIdx(0), &mut a).unwrap();
        assert_eq!(report.path, vec![NodeIdx(0), NodeIdx(1)]);
        assert_eq!(a.get("visited"), Some(&json!("a")));

        let mut z = storage(json!({"status": "Z"}));
        let report = graph.run(NodeIdx(0), &mut z).unwrap();
        assert_eq!(report.last(), Some(NodeIdx(3)));
        assert_eq!(z.get("visited"), Some(&json!("c")));
    }

    #[test]
    fn test_cycle_executes_until_condition_flips() {
        let mut graph = counter();
        let mut store = storage(json!({}));

        let report = graph.run(NodeIdx(0), &mut store).unwrap();

        assert_eq!(store.get("n"), Some(&json!(3)));
        assert_eq!(store.get("done"), Some(&json!(true)));
        assert_eq!(report.steps(), 7);
        assert_eq!(report.mode, ExecutionMode::Blocking);
    }

    #[tokio::test]
    async fn test_arun_matches_run() {
        let mut sync_graph = counter();
        let mut async_graph = counter();
        let mut sync_store = storage(json!({"n": 1}));
        let mut async_store = storage(json!({"n": 1}));

        let sync_report = sync_graph.run(NodeIdx(0), &mut sync_store).unwrap();
        let async_report = async_graph.arun(NodeIdx(0), &mut async_store).await.unwrap();

        assert_eq!(sync_report.path, async_report.path);
        assert_eq!(sync_store, async_store);
        assert_eq!(async_report.mode, ExecutionMode::Cooperative);
    }

    #[test]
    fn test_terminal_start_node() {
        let mut graph: Graph<StorageTask> = Graph::new();
        graph
            .insert(Node::new(5).with_task(StorageTask::set("ran", true)))
            .unwrap();
        let mut store = storage(json!({}));

        let report = graph.run(NodeIdx(5), &mut store).unwrap();

        assert_eq!(report.path, vec![NodeIdx(5)]);
        assert_eq!(store.get("ran"), Some(&json!(true)));
    }

    #[test]
    fn test_unknown_start_node() {
        let mut graph = router();
        let mut store = storage(json!({}));

        assert!(matches!(
            graph.run(NodeIdx(42), &mut store),
            Err(GraphError::NodeNotFound(NodeIdx(42)))
        ));
    }

    #[test]
    fn test_dangling_transition() {
        let mut graph: Graph<StorageTask> = Graph::new();
        graph
            .insert(Node::new(0).with_edge(Edge::simple(NodeIdx(9))))
            .unwrap();
        let mut store = storage(json!({}));

        assert!(matches!(
            graph.run(NodeIdx(0), &mut store),
            Err(GraphError::DanglingReference { from: NodeIdx(0), to: NodeIdx(9) })
        ));
    }

    #[test]
    fn test_task_failure_stops_execution() {
        let mut graph: Graph<StorageTask> = Graph::new();
        graph
            .insert(
                Node::new(0)
                    .with_task(StorageTask::fail("upstream unavailable"))
                    .with_edge(Edge::simple(NodeIdx(1))),
            )
            .unwrap();
        graph
            .insert(Node::new(1).with_task(StorageTask::set("reached", true)))
            .unwrap();
        let mut store = storage(json!({}));

        let err = graph.run(NodeIdx(0), &mut store).unwrap_err();

        assert_eq!(err.to_string(), "upstream unavailable");
        assert!(!store.contains_key("reached"));
    }

    #[test]
    fn test_step_limit() {
        let mut graph: Graph<StorageTask> = Graph::new().with_options(ExecutionOptions::with_max_steps(10));
        graph
            .insert(Node::new(0).with_edge(Edge::simple(NodeIdx(0))))
            .unwrap();
        let mut store = storage(json!({}));

        assert!(matches!(
            graph.run(NodeIdx(0), &mut store),
            Err(GraphError::StepLimitExceeded(10))
        ));
    }

    #[test]
    fn test_reloaded_graph_is_execution_equivalent() {
        let original = counter();
        let records = original.dump(NodeIdx(0)).unwrap();
        let mut reloaded: Graph<StorageTask> = Graph::load(&records).unwrap();
        let mut original = original;

        for n in [0, 2, 5] {
            let mut a = storage(json!({"n": n}));
            let mut b = storage(json!({"n": n}));

            let first = original.run(NodeIdx(0), &mut a).unwrap();
            let second = reloaded.run(NodeIdx(0), &mut b).unwrap();

            assert_eq!(first.path, second.path);
            assert_eq!(a, b);
        }
    }
}
