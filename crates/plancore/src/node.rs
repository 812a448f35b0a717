use crate::events::EventEmitter;
use crate::{NodeId, ProfileDictionary, DataStorage, TaskError, TaskStatus, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Core trait implemented by every executable leaf task.
///
/// A task reads its declared input keys from storage and returns its results
/// in the outcome; the engine commits them under the declared output keys
/// only when the task succeeds, so storage is never left partially written
/// for a node. Collaborator faults (solver, environment) must be caught and
/// converted to `TaskError::Collaborator`, never propagated raw.
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique type identifier (e.g., "plan.motion", "plan.merge")
    fn task_type(&self) -> &str;

    /// Execute the task against the shared storage.
    async fn execute(&self, ctx: TaskContext) -> Result<TaskOutcome, TaskError>;

    /// Optional: validate configuration at graph-construction time
    fn validate_config(&self, _config: &HashMap<String, Value>) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Execution context handed to each task invocation.
#[derive(Clone)]
pub struct TaskContext {
    pub node_id: NodeId,

    /// Node name as it appears in the graph, for reporting.
    pub name: String,

    /// Static configuration from the node spec
    pub config: HashMap<String, Value>,

    /// Keys this node declared; inputs are guaranteed present at dispatch
    pub input_keys: Vec<String>,
    pub output_keys: Vec<String>,

    /// Shared storage for the current execution
    pub storage: DataStorage,

    /// Read-only profile registry
    pub profiles: Arc<ProfileDictionary>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Cancellation token, checked by the engine between dispatches
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl TaskContext {
    /// Read a required input key from storage.
    pub async fn require_input(&self, key: &str) -> Result<Value, TaskError> {
        self.storage
            .get(key)
            .await
            .ok_or_else(|| TaskError::MissingInput(key.to_string()))
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, TaskError> {
        self.config
            .get(name)
            .ok_or_else(|| TaskError::InvalidConfiguration(format!("missing config: {}", name)))
    }

    /// Get config with default
    pub fn config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }
}

/// Result of one task execution: a terminal status plus the values to commit
/// under the node's declared output keys.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub outputs: HashMap<String, Value>,
}

impl TaskOutcome {
    pub fn succeeded() -> Self {
        Self {
            status: TaskStatus::Succeeded,
            outputs: HashMap::new(),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: TaskStatus::Failed,
            outputs: HashMap::new(),
        }
    }

    pub fn branch(selector: u32) -> Self {
        Self {
            status: TaskStatus::Branch(selector),
            outputs: HashMap::new(),
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }
}
