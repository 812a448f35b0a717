use async_trait::async_trait;
use plancore::{
    DataStorage, EdgeCondition, NodeSpec, ProfileDictionary, Task, TaskContext, TaskError,
    TaskGraph, TaskOutcome, Value,
};
use planruntime::{ComposerRuntime, RunStatus, TaskFactory, TaskRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Writes 1.0 under every declared output key and counts invocations.
struct EmitTask {
    counter: Arc<AtomicUsize>,
}

#[async_trait]
impl Task for EmitTask {
    fn task_type(&self) -> &str {
        "test.emit"
    }

    async fn execute(&self, ctx: TaskContext) -> Result<TaskOutcome, TaskError> {
        self.counter.fetch_add(1, Ordering::SeqCst);
        let mut outcome = TaskOutcome::succeeded();
        for key in &ctx.output_keys {
            outcome = outcome.with_output(key.clone(), 1.0);
        }
        Ok(outcome)
    }
}

struct EmitTaskFactory {
    counter: Arc<AtomicUsize>,
}

impl TaskFactory for EmitTaskFactory {
    fn create(&self, _config: &HashMap<String, Value>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(EmitTask {
            counter: self.counter.clone(),
        }))
    }

    fn task_type(&self) -> &str {
        "test.emit"
    }
}

struct FailTask;

#[async_trait]
impl Task for FailTask {
    fn task_type(&self) -> &str {
        "test.fail"
    }

    async fn execute(&self, _ctx: TaskContext) -> Result<TaskOutcome, TaskError> {
        Err(TaskError::ExecutionFailed("boom".to_string()))
    }
}

struct FailTaskFactory;

impl TaskFactory for FailTaskFactory {
    fn create(&self, _config: &HashMap<String, Value>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(FailTask))
    }

    fn task_type(&self) -> &str {
        "test.fail"
    }
}

/// Succeeds with a branch selector taken from config.
struct BranchTask {
    selector: u32,
}

#[async_trait]
impl Task for BranchTask {
    fn task_type(&self) -> &str {
        "test.branch"
    }

    async fn execute(&self, _ctx: TaskContext) -> Result<TaskOutcome, TaskError> {
        Ok(TaskOutcome::branch(self.selector))
    }
}

struct BranchTaskFactory;

impl TaskFactory for BranchTaskFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Box<dyn Task>, TaskError> {
        let selector = config
            .get("selector")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as u32;
        Ok(Box::new(BranchTask { selector }))
    }

    fn task_type(&self) -> &str {
        "test.branch"
    }
}

/// Initialize tracing for tests
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .try_init();
}

struct Harness {
    runtime: ComposerRuntime,
    emitted: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    init_tracing();
    let emitted = Arc::new(AtomicUsize::new(0));
    let mut registry = TaskRegistry::new();
    registry.register(Arc::new(EmitTaskFactory {
        counter: emitted.clone(),
    }));
    registry.register(Arc::new(FailTaskFactory));
    registry.register(Arc::new(BranchTaskFactory));
    Harness {
        runtime: ComposerRuntime::new(Arc::new(registry), Arc::new(ProfileDictionary::new())),
        emitted,
    }
}

#[tokio::test]
async fn linear_chain_executes_in_order() {
    let h = harness();
    let mut graph = TaskGraph::new("chain");
    let a = graph.add_node(NodeSpec::task("a", "test.emit").with_output("a/out"));
    let b = graph.add_node(
        NodeSpec::task("b", "test.emit")
            .with_input("a/out")
            .with_output("b/out"),
    );
    let c = graph.add_node(
        NodeSpec::task("c", "test.emit")
            .with_input("b/out")
            .with_output("c/out"),
    );
    graph.connect(a, EdgeCondition::OnSuccess, b);
    graph.connect(b, EdgeCondition::OnSuccess, c);

    let storage = DataStorage::new();
    let result = h.runtime.run(&graph, storage.clone()).await.unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert!(result.failed.is_empty());
    assert_eq!(result.executed, 3);
    assert_eq!(h.emitted.load(Ordering::SeqCst), 3);
    assert!(storage.has("c/out").await);
}

#[tokio::test]
async fn chain_failure_short_circuits_downstream() {
    let h = harness();
    let mut graph = TaskGraph::new("chain");
    let a = graph.add_node(NodeSpec::task("a", "test.emit").with_output("a/out"));
    let b = graph.add_node(NodeSpec::task("b", "test.fail").with_input("a/out"));
    let c = graph.add_node(NodeSpec::task("c", "test.emit").with_output("c/out"));
    graph.connect(a, EdgeCondition::OnSuccess, b);
    graph.connect(b, EdgeCondition::OnSuccess, c);

    let storage = DataStorage::new();
    let result = h.runtime.run(&graph, storage.clone()).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].name, "b");
    assert_eq!(result.failed[0].kind, "ExecutionFailed");
    assert_eq!(result.executed, 2);
    assert_eq!(result.skipped, 1);
    assert!(!storage.has("c/out").await);
    // Only "a" ran among the emit nodes.
    assert_eq!(h.emitted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn converging_node_executes_once() {
    let h = harness();
    let mut graph = TaskGraph::new("diamond");
    let a = graph.add_node(NodeSpec::task("a", "test.emit").conditional());
    let b = graph.add_node(NodeSpec::task("b", "test.emit").with_output("b/out"));
    let c = graph.add_node(NodeSpec::task("c", "test.emit").with_output("c/out"));
    let d = graph.add_node(NodeSpec::task("d", "test.emit").with_output("d/out"));
    graph.connect(a, EdgeCondition::OnSuccess, b);
    graph.connect(a, EdgeCondition::OnSuccess, c);
    graph.connect(b, EdgeCondition::OnSuccess, d);
    graph.connect(c, EdgeCondition::OnSuccess, d);

    let storage = DataStorage::new();
    let result = h.runtime.run(&graph, storage.clone()).await.unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    // a, b, c, d each exactly once even though d has two satisfied edges.
    assert_eq!(result.executed, 4);
    assert_eq!(h.emitted.load(Ordering::SeqCst), 4);
    assert!(storage.has("d/out").await);
}

#[tokio::test]
async fn missing_input_key_is_a_precondition_failure() {
    let h = harness();
    let mut graph = TaskGraph::new("starved");
    graph.add_node(NodeSpec::task("only", "test.emit").with_input("never-written"));

    let result = h.runtime.run(&graph, DataStorage::new()).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].kind, "PreconditionFailed");
    assert_eq!(h.emitted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn branch_selector_fires_matching_edge_only() {
    let h = harness();
    let mut graph = TaskGraph::new("switch");
    let a = graph.add_node(
        NodeSpec::task("a", "test.branch")
            .with_config("selector", 1.0)
            .conditional(),
    );
    let b = graph.add_node(NodeSpec::task("left", "test.emit").with_output("left/out"));
    let c = graph.add_node(NodeSpec::task("right", "test.emit").with_output("right/out"));
    graph.connect(a, EdgeCondition::OnBranch(0), b);
    graph.connect(a, EdgeCondition::OnBranch(1), c);

    let storage = DataStorage::new();
    let result = h.runtime.run(&graph, storage.clone()).await.unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.executed, 2);
    assert_eq!(result.skipped, 1);
    assert!(!storage.has("left/out").await);
    assert!(storage.has("right/out").await);
}

#[tokio::test]
async fn handled_failure_still_reported() {
    let h = harness();
    let mut graph = TaskGraph::new("recovery");
    let a = graph.add_node(NodeSpec::task("a", "test.fail").conditional());
    let ok = graph.add_node(NodeSpec::task("happy", "test.emit").with_output("happy/out"));
    let recover = graph.add_node(NodeSpec::task("recover", "test.emit").with_output("recover/out"));
    graph.connect(a, EdgeCondition::OnSuccess, ok);
    graph.connect(a, EdgeCondition::OnFailure, recover);

    let storage = DataStorage::new();
    let result = h.runtime.run(&graph, storage.clone()).await.unwrap();

    // The fallback branch runs, but the failed node is never swallowed.
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].name, "a");
    assert!(storage.has("recover/out").await);
    assert!(!storage.has("happy/out").await);
}

#[tokio::test]
async fn nested_failure_is_reported_with_qualified_name() {
    let h = harness();
    let mut inner = TaskGraph::new("inner");
    let ia = inner.add_node(NodeSpec::task("first", "test.emit").with_output("inner/out"));
    let ib = inner.add_node(NodeSpec::task("broken", "test.fail").with_input("inner/out"));
    inner.connect(ia, EdgeCondition::OnSuccess, ib);

    let mut graph = TaskGraph::new("outer");
    let sub = graph.add_node(NodeSpec::graph("sub", inner));
    let after = graph.add_node(NodeSpec::task("after", "test.emit").with_output("after/out"));
    graph.connect(sub, EdgeCondition::OnSuccess, after);

    let storage = DataStorage::new();
    let result = h.runtime.run(&graph, storage.clone()).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].name, "sub/broken");
    assert!(!storage.has("after/out").await);
}

#[tokio::test]
async fn composite_subgraph_shares_storage_with_parent() {
    let h = harness();
    let mut inner = TaskGraph::new("inner");
    inner.add_node(NodeSpec::task("writer", "test.emit").with_output("shared/out"));

    let mut graph = TaskGraph::new("outer");
    let sub = graph.add_node(NodeSpec::graph("sub", inner).with_output("shared/out"));
    let reader = graph.add_node(
        NodeSpec::task("reader", "test.emit")
            .with_input("shared/out")
            .with_output("reader/out"),
    );
    graph.connect(sub, EdgeCondition::OnSuccess, reader);

    let storage = DataStorage::new();
    let result = h.runtime.run(&graph, storage.clone()).await.unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert!(storage.has("shared/out").await);
    assert!(storage.has("reader/out").await);
}

#[tokio::test]
async fn cancelled_before_dispatch_runs_nothing() {
    let h = harness();
    let mut graph = TaskGraph::new("cancelled");
    graph.add_node(NodeSpec::task("a", "test.emit").with_output("a/out"));

    let token = CancellationToken::new();
    token.cancel();

    let result = h
        .runtime
        .run_with_cancellation(&graph, DataStorage::new(), token)
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.executed, 0);
    assert_eq!(h.emitted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_graph_is_rejected_before_execution() {
    let h = harness();
    let mut graph = TaskGraph::new("cyclic");
    let a = graph.add_node(NodeSpec::task("a", "test.emit").conditional());
    let b = graph.add_node(NodeSpec::task("b", "test.emit").conditional());
    graph.connect(a, EdgeCondition::OnSuccess, b);
    graph.connect(b, EdgeCondition::OnSuccess, a);

    assert!(h.runtime.run(&graph, DataStorage::new()).await.is_err());
    assert_eq!(h.emitted.load(Ordering::SeqCst), 0);
}
