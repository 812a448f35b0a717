use crate::collab::PlanningEnvironment;
use crate::terms::{
    ConstraintErrorFunction, CostAndConstraintTerms, SolverConfig, TermInfo, TermType,
};
use plancore::{
    ManipulatorInfo, MoveInstruction, ProfileDictionary, ProfileError, TaskError, Waypoint,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Capability kinds under which profiles are registered.
pub const PLAN_PROFILE_KIND: &str = "plan";
pub const SOLVER_PROFILE_KIND: &str = "solver";
pub const COMPOSITE_PROFILE_KIND: &str = "composite";

/// Turns one waypoint into cost/constraint terms.
pub trait PlanProfile: Send + Sync {
    fn create_terms(
        &self,
        instruction: &MoveInstruction,
        manip: &ManipulatorInfo,
        env: &dyn PlanningEnvironment,
        index: usize,
    ) -> Result<CostAndConstraintTerms, TaskError>;
}

/// Supplies the solver parameterization for one planning problem.
pub trait SolverProfile: Send + Sync {
    fn solver_config(&self) -> SolverConfig;
}

/// Adds terms spanning a whole trajectory range (smoothing and the like).
pub trait CompositeProfile: Send + Sync {
    fn create_smoothing_terms(&self, start_index: usize, end_index: usize)
        -> CostAndConstraintTerms;
}

/// Enable/weight/override settings for one term slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermConfig {
    pub enabled: bool,
    pub coeff: f64,
    #[serde(default)]
    pub use_tolerance_override: bool,
    #[serde(default)]
    pub lower_tolerance: Vec<f64>,
    #[serde(default)]
    pub upper_tolerance: Vec<f64>,
}

impl TermConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// The waypoint's own bounds unless this config overrides them.
    fn tolerances(&self, lower: &[f64], upper: &[f64]) -> (Vec<f64>, Vec<f64>) {
        if self.use_tolerance_override {
            (self.lower_tolerance.clone(), self.upper_tolerance.clone())
        } else {
            (lower.to_vec(), upper.to_vec())
        }
    }
}

impl Default for TermConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            coeff: 1.0,
            use_tolerance_override: false,
            lower_tolerance: Vec::new(),
            upper_tolerance: Vec::new(),
        }
    }
}

/// Standard waypoint-to-term adapter.
///
/// Waypoints enter as constraints by default; the cost slots exist for
/// profiles that prefer soft targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultPlanProfile {
    pub cartesian_cost: TermConfig,
    pub cartesian_constraint: TermConfig,
    pub joint_cost: TermConfig,
    pub joint_constraint: TermConfig,
    #[serde(skip)]
    pub constraint_error_functions: Vec<ConstraintErrorFunction>,
}

impl Default for DefaultPlanProfile {
    fn default() -> Self {
        Self {
            cartesian_cost: TermConfig::disabled(),
            cartesian_constraint: TermConfig::default(),
            joint_cost: TermConfig::disabled(),
            joint_constraint: TermConfig::default(),
            constraint_error_functions: Vec::new(),
        }
    }
}

impl DefaultPlanProfile {
    fn cartesian_terms(
        &self,
        waypoint: &plancore::CartesianWaypoint,
        mi: &ManipulatorInfo,
        env: &dyn PlanningEnvironment,
        index: usize,
    ) -> Result<CostAndConstraintTerms, TaskError> {
        let tcp_offset = env
            .find_tcp_offset(mi)
            .map_err(|e| TaskError::Collaborator(e.to_string()))?;

        /* Classify how the target relates to the moving kinematic chain:
         * static target and reference, target on the chain, or reference on
         * the chain. Both frames on the chain is physically meaningless.
         */
        let tcp_active = env.is_active_link(&mi.tcp_frame);
        let working_active = env.is_active_link(&mi.working_frame);
        if tcp_active && working_active {
            return Err(TaskError::UnsupportedConfiguration(format!(
                "tcp_frame '{}' and working_frame '{}' both move with the kinematic chain",
                mi.tcp_frame, mi.working_frame
            )));
        }
        let dynamic = tcp_active || working_active;

        let mut terms = CostAndConstraintTerms::new();
        for (config, term_type) in [
            (&self.cartesian_cost, TermType::Cost),
            (&self.cartesian_constraint, TermType::Constraint),
        ] {
            if !config.enabled {
                continue;
            }
            let (lower, upper) =
                config.tolerances(&waypoint.lower_tolerance, &waypoint.upper_tolerance);
            terms.push(
                term_type,
                TermInfo::CartesianWaypoint {
                    index,
                    working_frame: mi.working_frame.clone(),
                    target: waypoint.transform.clone(),
                    tcp_frame: mi.tcp_frame.clone(),
                    tcp_offset: tcp_offset.clone(),
                    coeff: config.coeff,
                    term_type,
                    lower_tolerance: lower,
                    upper_tolerance: upper,
                    dynamic,
                },
            );
        }
        Ok(terms)
    }

    fn joint_terms(&self, waypoint: &plancore::JointWaypoint, index: usize) -> CostAndConstraintTerms {
        let mut terms = CostAndConstraintTerms::new();
        for (config, term_type) in [
            (&self.joint_cost, TermType::Cost),
            (&self.joint_constraint, TermType::Constraint),
        ] {
            if !config.enabled {
                continue;
            }
            let (lower, upper) =
                config.tolerances(&waypoint.lower_tolerance, &waypoint.upper_tolerance);
            let toleranced = waypoint.is_toleranced() || config.use_tolerance_override;
            terms.push(
                term_type,
                TermInfo::JointWaypoint {
                    index,
                    position: waypoint.position.clone(),
                    coeff: config.coeff,
                    term_type,
                    lower_tolerance: if toleranced { lower } else { Vec::new() },
                    upper_tolerance: if toleranced { upper } else { Vec::new() },
                    toleranced,
                },
            );
        }
        terms
    }
}

impl PlanProfile for DefaultPlanProfile {
    fn create_terms(
        &self,
        instruction: &MoveInstruction,
        manip: &ManipulatorInfo,
        env: &dyn PlanningEnvironment,
        index: usize,
    ) -> Result<CostAndConstraintTerms, TaskError> {
        let mi = match &instruction.manipulator_info {
            Some(override_info) => manip.combined(override_info),
            None => manip.clone(),
        };

        if mi.manipulator.is_empty() {
            return Err(TaskError::InvalidConfiguration(
                "manipulator is empty".to_string(),
            ));
        }
        if mi.tcp_frame.is_empty() {
            return Err(TaskError::InvalidConfiguration(
                "tcp_frame is empty".to_string(),
            ));
        }
        if mi.working_frame.is_empty() {
            return Err(TaskError::InvalidConfiguration(
                "working_frame is empty".to_string(),
            ));
        }

        let mut terms = match &instruction.waypoint {
            Waypoint::Cartesian(waypoint) => self.cartesian_terms(waypoint, &mi, env, index)?,
            Waypoint::Joint(waypoint) => self.joint_terms(waypoint, index),
        };

        for function in &self.constraint_error_functions {
            terms.push(
                TermType::Constraint,
                TermInfo::UserDefined {
                    index,
                    function: function.clone(),
                },
            );
        }

        Ok(terms)
    }
}

/// Solver parameterization profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultSolverProfile {
    #[serde(default)]
    pub config: SolverConfigData,
}

/// Serializable mirror of `SolverConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfigData {
    pub max_iterations: u32,
    pub improvement_tolerance: f64,
    #[serde(default)]
    pub time_limit_secs: Option<f64>,
}

impl Default for SolverConfigData {
    fn default() -> Self {
        let d = SolverConfig::default();
        Self {
            max_iterations: d.max_iterations,
            improvement_tolerance: d.improvement_tolerance,
            time_limit_secs: d.time_limit_secs,
        }
    }
}

impl SolverProfile for DefaultSolverProfile {
    fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            max_iterations: self.config.max_iterations,
            improvement_tolerance: self.config.improvement_tolerance,
            time_limit_secs: self.config.time_limit_secs,
        }
    }
}

/// Whole-trajectory smoothing profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultCompositeProfile {
    pub velocity_coeff: f64,
    pub acceleration_coeff: f64,
    pub jerk_coeff: f64,
}

impl Default for DefaultCompositeProfile {
    fn default() -> Self {
        Self {
            velocity_coeff: 1.0,
            acceleration_coeff: 1.0,
            jerk_coeff: 0.0,
        }
    }
}

impl CompositeProfile for DefaultCompositeProfile {
    fn create_smoothing_terms(
        &self,
        start_index: usize,
        end_index: usize,
    ) -> CostAndConstraintTerms {
        let mut terms = CostAndConstraintTerms::new();
        terms.push(
            TermType::Cost,
            TermInfo::JointSmoothing {
                start_index,
                end_index,
                velocity_coeff: self.velocity_coeff,
                acceleration_coeff: self.acceleration_coeff,
                jerk_coeff: self.jerk_coeff,
            },
        );
        terms
    }
}

pub fn register_plan_profile(
    dictionary: &mut ProfileDictionary,
    name: impl Into<String>,
    profile: impl PlanProfile + 'static,
) {
    let profile: Arc<dyn PlanProfile> = Arc::new(profile);
    dictionary.insert(PLAN_PROFILE_KIND, name, profile);
}

pub fn register_solver_profile(
    dictionary: &mut ProfileDictionary,
    name: impl Into<String>,
    profile: impl SolverProfile + 'static,
) {
    let profile: Arc<dyn SolverProfile> = Arc::new(profile);
    dictionary.insert(SOLVER_PROFILE_KIND, name, profile);
}

pub fn register_composite_profile(
    dictionary: &mut ProfileDictionary,
    name: impl Into<String>,
    profile: impl CompositeProfile + 'static,
) {
    let profile: Arc<dyn CompositeProfile> = Arc::new(profile);
    dictionary.insert(COMPOSITE_PROFILE_KIND, name, profile);
}

pub fn resolve_plan_profile(
    dictionary: &ProfileDictionary,
    name: &str,
) -> Result<Arc<dyn PlanProfile>, ProfileError> {
    dictionary
        .resolve::<Arc<dyn PlanProfile>>(PLAN_PROFILE_KIND, name)
        .map(|p| (*p).clone())
}

pub fn resolve_solver_profile(
    dictionary: &ProfileDictionary,
    name: &str,
) -> Result<Arc<dyn SolverProfile>, ProfileError> {
    dictionary
        .resolve::<Arc<dyn SolverProfile>>(SOLVER_PROFILE_KIND, name)
        .map(|p| (*p).clone())
}

pub fn resolve_composite_profile(
    dictionary: &ProfileDictionary,
    name: &str,
) -> Result<Arc<dyn CompositeProfile>, ProfileError> {
    dictionary
        .resolve::<Arc<dyn CompositeProfile>>(COMPOSITE_PROFILE_KIND, name)
        .map(|p| (*p).clone())
}

/// Dictionary with DEFAULT profiles under every kind.
pub fn default_profile_dictionary() -> ProfileDictionary {
    let mut dictionary = ProfileDictionary::new();
    register_plan_profile(
        &mut dictionary,
        plancore::DEFAULT_PROFILE,
        DefaultPlanProfile::default(),
    );
    register_solver_profile(
        &mut dictionary,
        plancore::DEFAULT_PROFILE,
        DefaultSolverProfile::default(),
    );
    register_composite_profile(
        &mut dictionary,
        plancore::DEFAULT_PROFILE,
        DefaultCompositeProfile::default(),
    );
    dictionary
}

/// File format for a set of named profiles, loadable by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSetConfig {
    #[serde(default)]
    pub plan: HashMap<String, PlanProfileConfig>,
    #[serde(default)]
    pub solver: HashMap<String, SolverProfileConfig>,
    #[serde(default)]
    pub composite: HashMap<String, CompositeProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanProfileConfig {
    Default(DefaultPlanProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverProfileConfig {
    Default(DefaultSolverProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompositeProfileConfig {
    Default(DefaultCompositeProfile),
}

impl ProfileSetConfig {
    /// Build a dictionary from this config, on top of the built-in DEFAULTs
    /// (explicit DEFAULT entries replace them).
    pub fn build_dictionary(&self) -> ProfileDictionary {
        let mut dictionary = default_profile_dictionary();
        for (name, config) in &self.plan {
            match config {
                PlanProfileConfig::Default(profile) => {
                    register_plan_profile(&mut dictionary, name.clone(), profile.clone())
                }
            }
        }
        for (name, config) in &self.solver {
            match config {
                SolverProfileConfig::Default(profile) => {
                    register_solver_profile(&mut dictionary, name.clone(), profile.clone())
                }
            }
        }
        for (name, config) in &self.composite {
            match config {
                CompositeProfileConfig::Default(profile) => {
                    register_composite_profile(&mut dictionary, name.clone(), profile.clone())
                }
            }
        }
        dictionary
    }
}
