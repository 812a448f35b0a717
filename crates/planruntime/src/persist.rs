use crate::TaskRegistry;
use plancore::{ComposeError, GraphError, NodeKind, TaskGraph};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current pipeline file format version. Bump when the node/edge schema
/// changes incompatibly.
pub const PIPELINE_FORMAT_VERSION: u32 = 1;

/// On-disk envelope for a pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedPipeline {
    pub format_version: u32,
    pub graph: TaskGraph,
}

impl PersistedPipeline {
    pub fn new(graph: TaskGraph) -> Self {
        Self {
            format_version: PIPELINE_FORMAT_VERSION,
            graph,
        }
    }
}

/// Serialize a validated graph to a JSON pipeline file.
pub fn save_pipeline(path: impl AsRef<Path>, graph: &TaskGraph) -> Result<(), ComposeError> {
    graph.validate()?;
    let persisted = PersistedPipeline::new(graph.clone());
    let json = serde_json::to_string_pretty(&persisted)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a pipeline file back into an executable graph.
///
/// The version tag is checked first, the graph re-validated, and every leaf
/// task type (recursively) must be present in the registry so the loaded
/// graph is guaranteed runnable.
pub fn load_pipeline(
    path: impl AsRef<Path>,
    registry: &TaskRegistry,
) -> Result<TaskGraph, ComposeError> {
    let json = std::fs::read_to_string(path)?;
    let persisted: PersistedPipeline = serde_json::from_str(&json)?;

    if persisted.format_version != PIPELINE_FORMAT_VERSION {
        return Err(GraphError::UnsupportedVersion(persisted.format_version).into());
    }

    persisted.graph.validate()?;
    check_task_types(&persisted.graph, registry)?;

    Ok(persisted.graph)
}

fn check_task_types(graph: &TaskGraph, registry: &TaskRegistry) -> Result<(), ComposeError> {
    for node in &graph.nodes {
        match &node.kind {
            NodeKind::Task { task_type, .. } => {
                if !registry.contains(task_type) {
                    return Err(GraphError::UnknownTaskType(task_type.clone()).into());
                }
            }
            NodeKind::Graph(sub) => check_task_types(sub, registry)?,
        }
    }
    Ok(())
}
