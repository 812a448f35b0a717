use plancore::{GraphError, Task, TaskError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating task instances from persisted specs
pub trait TaskFactory: Send + Sync {
    /// Create a new instance of the task with given configuration
    fn create(&self, config: &HashMap<String, Value>) -> Result<Box<dyn Task>, TaskError>;

    /// Get task type identifier
    fn task_type(&self) -> &str;

    /// Optional: task metadata (description, input/output ports)
    fn metadata(&self) -> TaskMetadata {
        TaskMetadata::default()
    }
}

/// Metadata about a task type
#[derive(Debug, Clone)]
pub struct TaskMetadata {
    pub description: String,
    pub category: String,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
}

impl Default for TaskMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Registry of available task types.
///
/// The explicit tag-string to factory mapping is also what makes persisted
/// graphs reconstructible: a loaded pipeline is only accepted when every leaf
/// task type resolves here.
pub struct TaskRegistry {
    factories: HashMap<String, Arc<dyn TaskFactory>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a task factory
    pub fn register(&mut self, factory: Arc<dyn TaskFactory>) {
        let task_type = factory.task_type().to_string();
        tracing::info!("Registering task type: {}", task_type);
        self.factories.insert(task_type, factory);
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.factories.contains_key(task_type)
    }

    /// Create a task instance from a task type and config
    pub fn create_task(
        &self,
        task_type: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Task>, GraphError> {
        let factory = self
            .factories
            .get(task_type)
            .ok_or_else(|| GraphError::UnknownTaskType(task_type.to_string()))?;

        factory
            .create(config)
            .map_err(|e| GraphError::InvalidInput(format!("failed to create task '{}': {}", task_type, e)))
    }

    /// Get all registered task types
    pub fn list_task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a task type
    pub fn get_metadata(&self, task_type: &str) -> Option<TaskMetadata> {
        self.factories.get(task_type).map(|f| f.metadata())
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
