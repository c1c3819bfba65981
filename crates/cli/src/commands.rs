// Subcommand implementations

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use taskgraph_core::{
    ExecutionMode, ExecutionOptions, Graph, NodeIdx, NodeRecord, OperatorRegistry, StorageTask,
};

/// Result of `taskgraph run`
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub path: Vec<NodeIdx>,
    pub storage: Map<String, Value>,
}

/// Result of `taskgraph validate`
#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub nodes: usize,
    pub entry: Option<NodeIdx>,
    pub reachable: usize,
    pub cyclic: bool,
}

pub fn load_graph(path: &Path) -> Result<Graph<StorageTask>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph file {}", path.display()))?;
    let graph = Graph::from_json(&content, &OperatorRegistry::new())
        .with_context(|| format!("Failed to load graph from {}", path.display()))?;

    tracing::info!("Loaded {} nodes from {}", graph.len(), path.display());
    Ok(graph)
}

pub fn load_storage(path: Option<&Path>) -> Result<Map<String, Value>> {
    let Some(path) = path else {
        return Ok(Map::new());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read storage file {}", path.display()))?;
    match serde_json::from_str(&content).context("Failed to parse storage file")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Storage file must contain a JSON object, got {}", other),
    }
}

fn start_node(graph: &Graph<StorageTask>, start: Option<i64>) -> Result<NodeIdx> {
    match start {
        Some(idx) => Ok(NodeIdx(idx)),
        None => graph.entry().context("Graph has no nodes"),
    }
}

pub async fn run(
    graph_path: &Path,
    storage_path: Option<&Path>,
    start: Option<i64>,
    mode: ExecutionMode,
    options: ExecutionOptions,
) -> Result<RunOutput> {
    let mut graph = load_graph(graph_path)?.with_options(options);
    let mut storage = load_storage(storage_path)?;
    let start = start_node(&graph, start)?;

    let report = match mode {
        ExecutionMode::Blocking => graph.run(start, &mut storage),
        ExecutionMode::Cooperative => graph.arun(start, &mut storage).await,
    }
    .context("Graph execution failed")?;

    Ok(RunOutput {
        run_id: report.run_id.to_string(),
        path: report.path,
        storage,
    })
}

pub fn validate(graph_path: &Path) -> Result<ValidateOutput> {
    let graph = load_graph(graph_path)?;
    let entry = graph.entry();

    let (reachable, cyclic) = match entry {
        Some(idx) => (graph.reachable(idx)?.len(), graph.is_cyclic(idx)?),
        None => (0, false),
    };

    if cyclic {
        tracing::warn!("Graph contains a cycle; tasks must change storage for it to terminate");
    }

    Ok(ValidateOutput {
        nodes: graph.len(),
        entry,
        reachable,
        cyclic,
    })
}

pub fn normalize(graph_path: &Path, start: Option<i64>) -> Result<Vec<NodeRecord>> {
    let graph = load_graph(graph_path)?;
    let start = start_node(&graph, start)?;
    Ok(graph.dump(start)?)
}
