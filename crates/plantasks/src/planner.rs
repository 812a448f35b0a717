use crate::collab::{PlanningEnvironment, TrajectorySolver};
use crate::profiles::{resolve_composite_profile, resolve_plan_profile, resolve_solver_profile};
use crate::seed::interpolate_group;
use crate::terms::{CostAndConstraintTerms, ProblemRequest};
use async_trait::async_trait;
use plancore::{
    profile_name, Task, TaskContext, TaskError, TaskOutcome, Value,
};
use planruntime::{PortDefinition, TaskFactory, TaskMetadata};
use std::collections::HashMap;
use std::sync::Arc;

pub const MOTION_PLAN_TASK_TYPE: &str = "plan.motion";

/// Plans one program group: resolves the plan profile per instruction, builds
/// the cost/constraint term set, and hands the problem to the solver.
///
/// Solver and environment faults are converted to a failure status here; they
/// never cross the node boundary.
pub struct MotionPlanTask {
    env: Arc<dyn PlanningEnvironment>,
    solver: Arc<dyn TrajectorySolver>,
}

#[async_trait]
impl Task for MotionPlanTask {
    fn task_type(&self) -> &str {
        MOTION_PLAN_TASK_TYPE
    }

    async fn execute(&self, ctx: TaskContext) -> Result<TaskOutcome, TaskError> {
        let program_key = ctx
            .require_config("program_key")?
            .as_str()
            .ok_or_else(|| TaskError::InvalidConfiguration("program_key must be a string".into()))?
            .to_string();
        let group_index = ctx
            .require_config("group_index")?
            .as_f64()
            .ok_or_else(|| TaskError::InvalidConfiguration("group_index must be a number".into()))?
            as usize;

        let value = ctx.require_input(&program_key).await?;
        let program = value
            .as_program()
            .ok_or_else(|| TaskError::InvalidInputType {
                key: program_key.clone(),
                expected: "program".to_string(),
                actual: value.type_name().to_string(),
            })?;

        let group = program.groups.get(group_index).ok_or_else(|| {
            TaskError::InvalidConfiguration(format!(
                "program has {} groups, planner expects group {}",
                program.groups.len(),
                group_index
            ))
        })?;

        // Seed comes from an upstream node when wired, otherwise it is
        // interpolated in place (transition pipelines have no seed stage).
        let seed = match ctx.config.get("seed_key").and_then(|v| v.as_str()) {
            Some(seed_key) => {
                let value = ctx.require_input(seed_key).await?;
                value
                    .as_trajectory()
                    .ok_or_else(|| TaskError::InvalidInputType {
                        key: seed_key.to_string(),
                        expected: "trajectory".to_string(),
                        actual: value.type_name().to_string(),
                    })?
                    .clone()
            }
            None => interpolate_group(program, group, 5)?,
        };

        let mut terms = CostAndConstraintTerms::new();
        for (index, instruction) in group.instructions.iter().enumerate() {
            let name = profile_name(
                instruction.profile.as_deref(),
                group.profile.as_deref(),
            );
            let profile = resolve_plan_profile(&ctx.profiles, name)?;
            let instruction_terms =
                profile.create_terms(instruction, &program.manipulator, self.env.as_ref(), index)?;
            terms.extend(instruction_terms);
        }

        let group_profile = profile_name(None, group.profile.as_deref());
        match resolve_composite_profile(&ctx.profiles, group_profile) {
            Ok(profile) => {
                let end = group.instructions.len().saturating_sub(1);
                terms.extend(profile.create_smoothing_terms(0, end));
            }
            Err(e) => ctx
                .events
                .warn(format!("no composite profile, skipping smoothing: {}", e)),
        }

        let solver_profile = resolve_solver_profile(&ctx.profiles, group_profile)?;

        ctx.events.info(format!(
            "planning group {} with {} terms over {} seed points",
            group_index,
            terms.len(),
            seed.len()
        ));

        let request = ProblemRequest {
            manipulator: program.manipulator.clone(),
            seed,
            terms,
            solver_config: solver_profile.solver_config(),
        };

        let trajectory = self
            .solver
            .solve(&request)
            .map_err(|e| TaskError::Collaborator(e.to_string()))?;

        let output_key = ctx.output_keys.first().cloned().ok_or_else(|| {
            TaskError::InvalidConfiguration("planner task declares no output key".into())
        })?;
        Ok(TaskOutcome::succeeded().with_output(output_key, trajectory))
    }
}

pub struct MotionPlanTaskFactory {
    env: Arc<dyn PlanningEnvironment>,
    solver: Arc<dyn TrajectorySolver>,
}

impl MotionPlanTaskFactory {
    pub fn new(env: Arc<dyn PlanningEnvironment>, solver: Arc<dyn TrajectorySolver>) -> Self {
        Self { env, solver }
    }
}

impl TaskFactory for MotionPlanTaskFactory {
    fn create(&self, _config: &HashMap<String, Value>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(MotionPlanTask {
            env: self.env.clone(),
            solver: self.solver.clone(),
        }))
    }

    fn task_type(&self) -> &str {
        MOTION_PLAN_TASK_TYPE
    }

    fn metadata(&self) -> TaskMetadata {
        TaskMetadata {
            description: "Plan one program group through the trajectory solver".to_string(),
            category: "planning".to_string(),
            inputs: vec![
                PortDefinition {
                    name: "program".to_string(),
                    description: "composite program read through program_key".to_string(),
                    required: true,
                },
                PortDefinition {
                    name: "seed".to_string(),
                    description: "seed trajectory read through seed_key".to_string(),
                    required: false,
                },
            ],
            outputs: vec![PortDefinition {
                name: "trajectory".to_string(),
                description: "optimized joint trajectory".to_string(),
                required: true,
            }],
        }
    }
}
