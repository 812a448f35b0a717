use crate::{GraphExecutor, RunResult, TaskRegistry};
use plancore::{ComposeError, DataStorage, EventBus, ProfileDictionary, TaskGraph};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Main runtime tying together the task registry, profile dictionary,
/// executor, and event bus.
pub struct ComposerRuntime {
    registry: Arc<TaskRegistry>,
    profiles: Arc<ProfileDictionary>,
    executor: Arc<GraphExecutor>,
    event_bus: Arc<EventBus>,
    pipelines: Arc<RwLock<HashMap<uuid::Uuid, TaskGraph>>>,
}

impl ComposerRuntime {
    pub fn new(registry: Arc<TaskRegistry>, profiles: Arc<ProfileDictionary>) -> Self {
        Self::with_config(registry, profiles, RuntimeConfig::default())
    }

    pub fn with_config(
        registry: Arc<TaskRegistry>,
        profiles: Arc<ProfileDictionary>,
        config: RuntimeConfig,
    ) -> Self {
        let executor = Arc::new(GraphExecutor::new(config.max_parallel_nodes));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            registry,
            profiles,
            executor,
            event_bus,
            pipelines: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn profiles(&self) -> &Arc<ProfileDictionary> {
        &self.profiles
    }

    /// Register a pipeline for execution by id. The graph is validated here
    /// so a malformed pipeline is rejected before it can be run.
    pub async fn register_pipeline(&self, graph: TaskGraph) -> Result<uuid::Uuid, ComposeError> {
        graph.validate()?;
        let id = graph.id;
        let mut pipelines = self.pipelines.write().await;
        pipelines.insert(id, graph);
        Ok(id)
    }

    /// Execute a registered pipeline by id.
    pub async fn run_pipeline(
        &self,
        pipeline_id: uuid::Uuid,
        storage: DataStorage,
    ) -> Result<RunResult, ComposeError> {
        let pipelines = self.pipelines.read().await;
        let graph = pipelines
            .get(&pipeline_id)
            .ok_or_else(|| ComposeError::Execution(format!("pipeline not found: {}", pipeline_id)))?;
        self.run_with_cancellation(graph, storage, CancellationToken::new())
            .await
    }

    /// Execute a graph directly (without registration).
    pub async fn run(
        &self,
        graph: &TaskGraph,
        storage: DataStorage,
    ) -> Result<RunResult, ComposeError> {
        self.run_with_cancellation(graph, storage, CancellationToken::new())
            .await
    }

    /// Execute with an external cancellation signal, checked by the engine
    /// between node dispatches.
    pub async fn run_with_cancellation(
        &self,
        graph: &TaskGraph,
        storage: DataStorage,
        cancellation: CancellationToken,
    ) -> Result<RunResult, ComposeError> {
        self.executor
            .execute(
                graph,
                &self.registry,
                &self.profiles,
                &self.event_bus,
                storage,
                cancellation,
            )
            .await
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<plancore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 8,
            event_buffer_size: 1024,
        }
    }
}
