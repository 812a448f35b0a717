//! Graph execution runtime
//!
//! This crate provides the engine that walks task graphs honoring branch
//! conditions, the registry of task factories, and pipeline persistence.

mod executor;
mod persist;
mod registry;
mod runtime;

pub use executor::{GraphExecutor, NodeFailure, RunResult, RunStatus};
pub use persist::{load_pipeline, save_pipeline, PersistedPipeline, PIPELINE_FORMAT_VERSION};
pub use registry::{PortDefinition, TaskFactory, TaskMetadata, TaskRegistry};
pub use runtime::{ComposerRuntime, RuntimeConfig};
