//! Planning task library
//!
//! Concrete leaf tasks (seed, motion plan, merge), the profile types they
//! consult, the raster pipeline builder, and the collaborator interfaces at
//! the solver/environment boundary.

pub mod collab;
mod merge;
mod planner;
pub mod profiles;
pub mod raster;
mod seed;
pub mod terms;

pub use merge::{MergeTrajectoriesTask, MergeTrajectoriesTaskFactory, MERGE_TASK_TYPE};
pub use planner::{MotionPlanTask, MotionPlanTaskFactory, MOTION_PLAN_TASK_TYPE};
pub use raster::{build_pipeline, RasterPipelineBuilder, SubPipelineBuilder};
pub use seed::{interpolate_group, SeedTask, SeedTaskFactory, SEED_TASK_TYPE};

use crate::collab::{PlanningEnvironment, TrajectorySolver};
use planruntime::TaskRegistry;
use std::sync::Arc;

/// Register all planning tasks with a registry. The environment and solver
/// collaborators are shared by every planner instance the registry creates.
pub fn register_all(
    registry: &mut TaskRegistry,
    env: Arc<dyn PlanningEnvironment>,
    solver: Arc<dyn TrajectorySolver>,
) {
    registry.register(Arc::new(SeedTaskFactory));
    registry.register(Arc::new(MotionPlanTaskFactory::new(env, solver)));
    registry.register(Arc::new(MergeTrajectoriesTaskFactory));
}
