use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a single task during execution.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("Missing required input key: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{key}': expected {expected}, got {actual}")]
    InvalidInputType {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

impl TaskError {
    /// Stable kind label used in failure reports and events.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::MissingInput(_) => "PreconditionFailed",
            TaskError::InvalidInputType { .. } => "PreconditionFailed",
            TaskError::InvalidConfiguration(_) => "InvalidConfiguration",
            TaskError::UnsupportedConfiguration(_) => "UnsupportedConfiguration",
            TaskError::Profile(_) => "ProfileNotFound",
            TaskError::Collaborator(_) => "ExternalCollaboratorFailure",
            TaskError::ExecutionFailed(_) => "ExecutionFailed",
            TaskError::Cancelled => "Cancelled",
        }
    }
}

/// Construction-time graph errors. A graph that fails these checks is never
/// returned to the caller, partially built or otherwise.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid input structure: {0}")]
    InvalidInput(String),

    #[error("Cyclic dependency detected in graph '{0}'")]
    CyclicDependency(String),

    #[error("Graph '{0}' has no entry node")]
    NoEntryNode(String),

    #[error("Graph '{graph}' has multiple entry nodes: {nodes:?}")]
    MultipleEntryNodes { graph: String, nodes: Vec<String> },

    #[error("Output key '{key}' is owned by both '{first}' and '{second}'")]
    DuplicateOutputKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Unsupported pipeline format version: {0}")]
    UnsupportedVersion(u32),
}

#[derive(Error, Debug, Clone)]
pub enum ProfileError {
    #[error("Profile not found: kind '{kind}', name '{name}'")]
    NotFound { kind: String, name: String },
}
