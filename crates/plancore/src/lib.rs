//! Core abstractions for the task composer
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: the task/graph data model, the keyed data storage
//! shared during one execution, and the profile dictionary.

mod error;
pub mod events;
mod graph;
mod node;
mod profile;
mod program;
mod storage;
mod value;

pub use error::{ComposeError, GraphError, ProfileError, TaskError};
pub use graph::{
    Edge, EdgeCondition, GraphTopology, NodeId, NodeKind, NodeSpec, NodeTopology, TaskGraph,
    TaskStatus,
};
pub use node::{Task, TaskContext, TaskOutcome};
pub use profile::{profile_name, ProfileDictionary, DEFAULT_PROFILE};
pub use program::{
    CartesianWaypoint, CompositeProgram, JointTrajectory, JointWaypoint, ManipulatorInfo,
    MoveInstruction, ProgramGroup, TrajectoryPoint, Transform, Waypoint,
};
pub use storage::DataStorage;
pub use value::Value;
pub use events::*;

/// Result type for composer operations
pub type Result<T> = std::result::Result<T, ComposeError>;
