use plancore::{JointTrajectory, ManipulatorInfo, Transform};
use std::fmt;
use std::sync::Arc;

/// Whether a term enters the objective or the constraint set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermType {
    Cost,
    Constraint,
}

/// Constraint class for user-supplied error functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserConstraintType {
    Equality,
    Inequality,
}

/// Auxiliary error function evaluated by the solver at each state.
pub type ConstraintErrorFn = Arc<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// A user-supplied constraint paired with its class and weighting.
#[derive(Clone)]
pub struct ConstraintErrorFunction {
    pub function: ConstraintErrorFn,
    pub constraint_type: UserConstraintType,
    pub coeff: f64,
}

impl fmt::Debug for ConstraintErrorFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintErrorFunction")
            .field("constraint_type", &self.constraint_type)
            .field("coeff", &self.coeff)
            .finish_non_exhaustive()
    }
}

/// One cost or constraint descriptor handed to the solver.
#[derive(Debug, Clone)]
pub enum TermInfo {
    CartesianWaypoint {
        index: usize,
        working_frame: String,
        target: Transform,
        tcp_frame: String,
        tcp_offset: Transform,
        coeff: f64,
        term_type: TermType,
        lower_tolerance: Vec<f64>,
        upper_tolerance: Vec<f64>,
        /// True when either frame rides the moving kinematic chain.
        dynamic: bool,
    },
    JointWaypoint {
        index: usize,
        position: Vec<f64>,
        coeff: f64,
        term_type: TermType,
        lower_tolerance: Vec<f64>,
        upper_tolerance: Vec<f64>,
        toleranced: bool,
    },
    UserDefined {
        index: usize,
        function: ConstraintErrorFunction,
    },
    JointSmoothing {
        start_index: usize,
        end_index: usize,
        velocity_coeff: f64,
        acceleration_coeff: f64,
        jerk_coeff: f64,
    },
}

/// Constructed term set for one planning problem.
#[derive(Debug, Clone, Default)]
pub struct CostAndConstraintTerms {
    pub costs: Vec<TermInfo>,
    pub constraints: Vec<TermInfo>,
}

impl CostAndConstraintTerms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, term_type: TermType, term: TermInfo) {
        match term_type {
            TermType::Cost => self.costs.push(term),
            TermType::Constraint => self.constraints.push(term),
        }
    }

    pub fn extend(&mut self, other: CostAndConstraintTerms) {
        self.costs.extend(other.costs);
        self.constraints.extend(other.constraints);
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty() && self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.costs.len() + self.constraints.len()
    }
}

/// Solver parameterization produced by a solver profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub max_iterations: u32,
    pub improvement_tolerance: f64,
    pub time_limit_secs: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            improvement_tolerance: 1e-4,
            time_limit_secs: None,
        }
    }
}

/// Complete problem handed to the trajectory solver.
#[derive(Debug, Clone)]
pub struct ProblemRequest {
    pub manipulator: ManipulatorInfo,
    pub seed: JointTrajectory,
    pub terms: CostAndConstraintTerms,
    pub solver_config: SolverConfig,
}
