use crate::registry::TaskRegistry;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use plancore::{
    ComposeError, DataStorage, EventBus, ExecutionEvent, ExecutionId, NodeId, NodeKind, NodeSpec,
    ProfileDictionary, TaskContext, TaskError, TaskGraph, TaskOutcome, TaskStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Walks a task graph honoring edge conditions, dispatching ready nodes in
/// parallel up to a limit.
pub struct GraphExecutor {
    max_parallel: usize,
}

/// Per-run state of one node.
#[derive(Debug, Clone, PartialEq)]
enum NodeRunState {
    Pending,
    Ready,
    Running,
    Done(TaskStatus),
    Skipped,
}

/// One failed node in the final report.
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub node_id: NodeId,
    /// Name qualified with the owning composite path, e.g. "raster/segment-1/plan".
    pub name: String,
    pub kind: String,
    pub error: String,
}

/// Aggregate outcome of one graph run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub execution_id: ExecutionId,
    pub status: RunStatus,
    pub failed: Vec<NodeFailure>,
    pub executed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

/// Shared handles threaded through nested graph runs.
#[derive(Clone)]
struct RunShared {
    registry: Arc<TaskRegistry>,
    profiles: Arc<ProfileDictionary>,
    events: Arc<EventBus>,
    storage: DataStorage,
    cancellation: CancellationToken,
    execution_id: ExecutionId,
    max_parallel: usize,
}

/// Result of one nested graph run.
struct GraphRunOutcome {
    status: TaskStatus,
    failures: Vec<NodeFailure>,
    executed: usize,
    skipped: usize,
    cancelled: bool,
}

struct NodeCompletion {
    node_id: NodeId,
    duration_ms: u64,
    result: NodeResult,
}

enum NodeResult {
    Leaf(Result<TaskOutcome, TaskError>),
    Sub(GraphRunOutcome),
}

impl GraphExecutor {
    pub fn new(max_parallel: usize) -> Self {
        Self { max_parallel }
    }

    /// Execute a graph against the given storage and return the aggregate
    /// result. The graph is re-validated before the first dispatch.
    pub async fn execute(
        &self,
        graph: &TaskGraph,
        registry: &Arc<TaskRegistry>,
        profiles: &Arc<ProfileDictionary>,
        event_bus: &Arc<EventBus>,
        storage: DataStorage,
        cancellation: CancellationToken,
    ) -> Result<RunResult, ComposeError> {
        graph.validate()?;

        let execution_id = Uuid::new_v4();
        let start_time = Instant::now();

        event_bus.emit(ExecutionEvent::GraphStarted {
            execution_id,
            graph_id: graph.id,
            graph_name: graph.name.clone(),
            timestamp: Utc::now(),
        });

        tracing::info!("Starting graph execution: {}", graph.name);

        let shared = RunShared {
            registry: registry.clone(),
            profiles: profiles.clone(),
            events: event_bus.clone(),
            storage,
            cancellation,
            execution_id,
            max_parallel: self.max_parallel,
        };

        let outcome = run_graph(shared, Arc::new(graph.clone()), String::new()).await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let status = if outcome.cancelled {
            RunStatus::Cancelled
        } else if !outcome.failures.is_empty() || outcome.status == TaskStatus::Failed {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };

        event_bus.emit(ExecutionEvent::GraphCompleted {
            execution_id,
            success: status == RunStatus::Succeeded,
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(RunResult {
            execution_id,
            status,
            failed: outcome.failures,
            executed: outcome.executed,
            skipped: outcome.skipped,
            duration_ms,
        })
    }
}

/// Run one graph level. Boxed because composite nodes recurse.
fn run_graph(
    shared: RunShared,
    graph: Arc<TaskGraph>,
    prefix: String,
) -> BoxFuture<'static, GraphRunOutcome> {
    Box::pin(async move {
        let mut states: HashMap<NodeId, NodeRunState> = graph
            .nodes
            .iter()
            .map(|n| (n.id, NodeRunState::Pending))
            .collect();
        let mut failures: Vec<NodeFailure> = Vec::new();
        let mut running: FuturesUnordered<BoxFuture<'static, NodeCompletion>> =
            FuturesUnordered::new();
        let mut cancelled = false;
        let mut nested_executed = 0;
        let mut nested_skipped = 0;

        // Safe: validate() guarantees exactly one entry node.
        let entry_id = graph.entry_node().map(|n| n.id);
        if let Some(id) = entry_id {
            states.insert(id, NodeRunState::Ready);
        }

        loop {
            // Cancellation is honored between dispatches; running nodes are
            // allowed to finish.
            if shared.cancellation.is_cancelled() {
                cancelled = true;
            }

            if !cancelled {
                let ready: Vec<NodeId> = graph
                    .nodes
                    .iter()
                    .filter(|n| states.get(&n.id) == Some(&NodeRunState::Ready))
                    .map(|n| n.id)
                    .collect();

                for node_id in ready {
                    if running.len() >= shared.max_parallel {
                        break;
                    }
                    let node = graph
                        .find_node(node_id)
                        .expect("ready node exists in graph")
                        .clone();
                    let qualified = qualify(&prefix, &node.name);

                    // Declared input keys must exist before a node may run.
                    let mut missing = None;
                    for key in &node.input_keys {
                        if !shared.storage.has(key).await {
                            missing = Some(key.clone());
                            break;
                        }
                    }
                    if let Some(key) = missing {
                        let error = TaskError::MissingInput(key);
                        record_failure(
                            &shared,
                            &mut states,
                            &mut failures,
                            &node,
                            &qualified,
                            &error,
                        );
                        propagate_edges(&shared, &graph, &prefix, &mut states, node_id);
                        continue;
                    }

                    states.insert(node_id, NodeRunState::Running);
                    shared.events.emit(ExecutionEvent::NodeStarted {
                        execution_id: shared.execution_id,
                        node_id,
                        node_name: qualified.clone(),
                        timestamp: Utc::now(),
                    });

                    running.push(dispatch_node(&shared, node, qualified, &prefix));
                }
            }

            if running.is_empty() {
                // A failure handled during dispatch can ready new nodes;
                // only stop when nothing is runnable at all.
                let any_ready = !cancelled
                    && graph
                        .nodes
                        .iter()
                        .any(|n| states.get(&n.id) == Some(&NodeRunState::Ready));
                if any_ready {
                    continue;
                }
                break;
            }

            let Some(completion) = running.next().await else {
                break;
            };
            let node = graph
                .find_node(completion.node_id)
                .expect("completed node exists in graph")
                .clone();
            let qualified = qualify(&prefix, &node.name);

            match completion.result {
                NodeResult::Leaf(Ok(outcome)) => {
                    let status =
                        commit_outcome(&shared, &node, &qualified, outcome, &mut failures).await;
                    states.insert(node.id, NodeRunState::Done(status));
                    if status.succeeded() {
                        shared.events.emit(ExecutionEvent::NodeCompleted {
                            execution_id: shared.execution_id,
                            node_id: node.id,
                            node_name: qualified.clone(),
                            status,
                            duration_ms: completion.duration_ms,
                            timestamp: Utc::now(),
                        });
                    }
                    tracing::debug!(
                        "Node {} completed with {:?} in {}ms",
                        qualified,
                        status,
                        completion.duration_ms
                    );
                }
                NodeResult::Leaf(Err(error)) => {
                    record_failure(&shared, &mut states, &mut failures, &node, &qualified, &error);
                }
                NodeResult::Sub(sub) => {
                    if sub.cancelled {
                        cancelled = true;
                    }
                    nested_executed += sub.executed;
                    nested_skipped += sub.skipped;
                    failures.extend(sub.failures);
                    let mut status = sub.status;
                    if status.succeeded() {
                        // Composite postcondition: its declared outputs must
                        // have been produced by the subtree.
                        for key in &node.output_keys {
                            if !shared.storage.has(key).await {
                                let error = TaskError::ExecutionFailed(format!(
                                    "subgraph completed without output key '{}'",
                                    key
                                ));
                                failures.push(NodeFailure {
                                    node_id: node.id,
                                    name: qualified.clone(),
                                    kind: error.kind().to_string(),
                                    error: error.to_string(),
                                });
                                status = TaskStatus::Failed;
                                break;
                            }
                        }
                    }
                    states.insert(node.id, NodeRunState::Done(status));
                    shared.events.emit(ExecutionEvent::NodeCompleted {
                        execution_id: shared.execution_id,
                        node_id: node.id,
                        node_name: qualified,
                        status,
                        duration_ms: completion.duration_ms,
                        timestamp: Utc::now(),
                    });
                }
            }

            propagate_edges(&shared, &graph, &prefix, &mut states, node.id);
        }

        // Leaf counts only: composite nodes report the work of their
        // subtree, not themselves.
        let executed = nested_executed
            + graph
                .nodes
                .iter()
                .filter(|n| {
                    matches!(n.kind, NodeKind::Task { .. })
                        && matches!(states.get(&n.id), Some(NodeRunState::Done(_)))
                })
                .count();
        let skipped = nested_skipped
            + graph
                .nodes
                .iter()
                .filter(|n| {
                    matches!(n.kind, NodeKind::Task { .. })
                        && matches!(states.get(&n.id), Some(NodeRunState::Skipped))
                })
                .count();

        // The level succeeds when nothing failed and some terminal node
        // finished successfully.
        let terminal_succeeded = graph.terminal_nodes().iter().any(|n| {
            matches!(states.get(&n.id), Some(NodeRunState::Done(s)) if s.succeeded())
        });
        let status = if failures.is_empty() && terminal_succeeded && !cancelled {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        };

        GraphRunOutcome {
            status,
            failures,
            executed,
            skipped,
            cancelled,
        }
    })
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Build the completion future for one node: leaf tasks are spawned so a
/// panicking task cannot take the walker down; composite nodes recurse into
/// their subgraph sharing the same storage.
fn dispatch_node(
    shared: &RunShared,
    node: NodeSpec,
    qualified: String,
    prefix: &str,
) -> BoxFuture<'static, NodeCompletion> {
    let NodeSpec {
        id: node_id,
        name,
        kind,
        input_keys,
        output_keys,
        ..
    } = node;
    match kind {
        NodeKind::Task { task_type, config } => {
            let shared = shared.clone();
            Box::pin(async move {
                let start = Instant::now();
                let task = match shared.registry.create_task(&task_type, &config) {
                    Ok(task) => task,
                    Err(e) => {
                        return NodeCompletion {
                            node_id,
                            duration_ms: 0,
                            result: NodeResult::Leaf(Err(TaskError::InvalidConfiguration(
                                e.to_string(),
                            ))),
                        }
                    }
                };
                let ctx = TaskContext {
                    node_id,
                    name: qualified,
                    config,
                    input_keys,
                    output_keys,
                    storage: shared.storage.clone(),
                    profiles: shared.profiles.clone(),
                    events: shared.events.create_emitter(shared.execution_id, node_id),
                    cancellation: shared.cancellation.clone(),
                };
                let handle = tokio::spawn(async move { task.execute(ctx).await });
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(TaskError::ExecutionFailed(format!("task panicked: {}", e))),
                };
                NodeCompletion {
                    node_id,
                    duration_ms: start.elapsed().as_millis() as u64,
                    result: NodeResult::Leaf(result),
                }
            })
        }
        NodeKind::Graph(subgraph) => {
            let shared = shared.clone();
            let child_prefix = qualify(prefix, &name);
            Box::pin(async move {
                let start = Instant::now();
                let outcome = run_graph(shared, Arc::new(subgraph), child_prefix).await;
                NodeCompletion {
                    node_id,
                    duration_ms: start.elapsed().as_millis() as u64,
                    result: NodeResult::Sub(outcome),
                }
            })
        }
    }
}

/// Commit a successful outcome's outputs, demoting the node to failed when a
/// declared output key is missing. Only declared keys are ever written.
async fn commit_outcome(
    shared: &RunShared,
    node: &NodeSpec,
    qualified: &str,
    mut outcome: TaskOutcome,
    failures: &mut Vec<NodeFailure>,
) -> TaskStatus {
    if !outcome.status.succeeded() {
        failures.push(NodeFailure {
            node_id: node.id,
            name: qualified.to_string(),
            kind: "ExecutionFailed".to_string(),
            error: "task reported failure".to_string(),
        });
        shared.events.emit(ExecutionEvent::NodeFailed {
            execution_id: shared.execution_id,
            node_id: node.id,
            node_name: qualified.to_string(),
            error: "task reported failure".to_string(),
            timestamp: Utc::now(),
        });
        return TaskStatus::Failed;
    }

    for key in &node.output_keys {
        if !outcome.outputs.contains_key(key) {
            let error = TaskError::ExecutionFailed(format!(
                "task succeeded without declared output key '{}'",
                key
            ));
            failures.push(NodeFailure {
                node_id: node.id,
                name: qualified.to_string(),
                kind: error.kind().to_string(),
                error: error.to_string(),
            });
            shared.events.emit(ExecutionEvent::NodeFailed {
                execution_id: shared.execution_id,
                node_id: node.id,
                node_name: qualified.to_string(),
                error: error.to_string(),
                timestamp: Utc::now(),
            });
            return TaskStatus::Failed;
        }
    }
    for key in &node.output_keys {
        if let Some(value) = outcome.outputs.remove(key) {
            shared.storage.put(key.clone(), value).await;
        }
    }
    outcome.status
}

fn record_failure(
    shared: &RunShared,
    states: &mut HashMap<NodeId, NodeRunState>,
    failures: &mut Vec<NodeFailure>,
    node: &NodeSpec,
    qualified: &str,
    error: &TaskError,
) {
    tracing::error!("Node {} failed: {}", qualified, error);
    states.insert(node.id, NodeRunState::Done(TaskStatus::Failed));
    failures.push(NodeFailure {
        node_id: node.id,
        name: qualified.to_string(),
        kind: error.kind().to_string(),
        error: error.to_string(),
    });
    shared.events.emit(ExecutionEvent::NodeFailed {
        execution_id: shared.execution_id,
        node_id: node.id,
        node_name: qualified.to_string(),
        error: error.to_string(),
        timestamp: Utc::now(),
    });
}

/// After a node reaches a terminal status, fire its satisfied outgoing edges
/// and starve nodes no remaining edge can reach. Re-convergence is OR: one
/// satisfied predecessor readies a node, and a node already past Pending is
/// never re-entered.
fn propagate_edges(
    shared: &RunShared,
    graph: &TaskGraph,
    prefix: &str,
    states: &mut HashMap<NodeId, NodeRunState>,
    completed: NodeId,
) {
    let status = match states.get(&completed) {
        Some(NodeRunState::Done(status)) => *status,
        _ => return,
    };

    for edge in graph.outgoing_edges(completed) {
        if edge.condition.matches(status)
            && states.get(&edge.to) == Some(&NodeRunState::Pending)
        {
            states.insert(edge.to, NodeRunState::Ready);
        }
    }

    // Fixpoint skip propagation: a pending node whose incoming edges all
    // originate from finished-but-unsatisfying or skipped sources can never
    // become ready in this run.
    loop {
        let mut changed = false;
        for node in &graph.nodes {
            if states.get(&node.id) != Some(&NodeRunState::Pending) {
                continue;
            }
            let mut dead = true;
            for edge in graph.incoming_edges(node.id) {
                match states.get(&edge.from) {
                    Some(NodeRunState::Done(s)) => {
                        if edge.condition.matches(*s) {
                            dead = false;
                        }
                    }
                    Some(NodeRunState::Skipped) => {}
                    _ => {
                        dead = false;
                    }
                }
                if !dead {
                    break;
                }
            }
            if dead {
                states.insert(node.id, NodeRunState::Skipped);
                shared.events.emit(ExecutionEvent::NodeSkipped {
                    execution_id: shared.execution_id,
                    node_id: node.id,
                    node_name: qualify(prefix, &node.name),
                    timestamp: Utc::now(),
                });
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}
