use crate::terms::ProblemRequest;
use plancore::{JointTrajectory, ManipulatorInfo, Transform, TrajectoryPoint};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Faults raised by the environment/kinematics collaborator. Tasks convert
/// these into failure statuses; they never cross a node boundary raw.
#[derive(Error, Debug, Clone)]
pub enum EnvironmentFault {
    #[error("unknown manipulator: {0}")]
    UnknownManipulator(String),
}

/// Environment/kinematics queries consumed by plan profiles.
pub trait PlanningEnvironment: Send + Sync {
    /// Tool-center-point offset for the given manipulator.
    fn find_tcp_offset(&self, manip: &ManipulatorInfo) -> Result<Transform, EnvironmentFault>;

    /// Whether a named frame belongs to the moving kinematic chain.
    fn is_active_link(&self, frame: &str) -> bool;
}

/// Faults raised by the trajectory solver collaborator.
#[derive(Error, Debug, Clone)]
pub enum SolverFault {
    #[error("solver did not converge: {0}")]
    DidNotConverge(String),

    #[error("problem is infeasible: {0}")]
    Infeasible(String),
}

/// Narrow sink for constructed cost/constraint terms: takes a problem
/// request, returns an optimized trajectory or a fault.
pub trait TrajectorySolver: Send + Sync {
    fn solve(&self, request: &ProblemRequest) -> Result<JointTrajectory, SolverFault>;
}

/// Table-driven environment: a fixed active-link set plus per-manipulator
/// TCP offsets. Enough for tests and the CLI; a real kinematics backend
/// implements the same trait.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticEnvironment {
    pub active_links: HashSet<String>,
    #[serde(default)]
    pub tcp_offsets: HashMap<String, Transform>,
}

impl StaticEnvironment {
    pub fn new(active_links: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            active_links: active_links.into_iter().map(Into::into).collect(),
            tcp_offsets: HashMap::new(),
        }
    }

    pub fn with_tcp_offset(mut self, manipulator: impl Into<String>, offset: Transform) -> Self {
        self.tcp_offsets.insert(manipulator.into(), offset);
        self
    }
}

impl PlanningEnvironment for StaticEnvironment {
    fn find_tcp_offset(&self, manip: &ManipulatorInfo) -> Result<Transform, EnvironmentFault> {
        Ok(self
            .tcp_offsets
            .get(&manip.manipulator)
            .cloned()
            .unwrap_or_default())
    }

    fn is_active_link(&self, frame: &str) -> bool {
        self.active_links.contains(frame)
    }
}

/// Solver stand-in that accepts the seed as the solution, applying the
/// configured time step. Keeps pipelines end-to-end runnable without a
/// numerical back-end.
#[derive(Debug, Clone)]
pub struct InterpolationSolver {
    pub time_step: f64,
}

impl Default for InterpolationSolver {
    fn default() -> Self {
        Self { time_step: 0.1 }
    }
}

impl TrajectorySolver for InterpolationSolver {
    fn solve(&self, request: &ProblemRequest) -> Result<JointTrajectory, SolverFault> {
        if request.seed.is_empty() {
            return Err(SolverFault::Infeasible("empty seed trajectory".to_string()));
        }
        let points = request
            .seed
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| TrajectoryPoint {
                positions: p.positions.clone(),
                time_from_start: i as f64 * self.time_step,
            })
            .collect();
        Ok(JointTrajectory {
            joint_names: request.seed.joint_names.clone(),
            points,
        })
    }
}

/// Test double that always faults.
#[derive(Debug, Clone)]
pub struct FailingSolver {
    pub message: String,
}

impl FailingSolver {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TrajectorySolver for FailingSolver {
    fn solve(&self, _request: &ProblemRequest) -> Result<JointTrajectory, SolverFault> {
        Err(SolverFault::DidNotConverge(self.message.clone()))
    }
}
