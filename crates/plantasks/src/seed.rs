use async_trait::async_trait;
use plancore::{
    CompositeProgram, JointTrajectory, ProgramGroup, Task, TaskContext, TaskError, TaskOutcome,
    TrajectoryPoint, Value, Waypoint,
};
use planruntime::{PortDefinition, TaskFactory, TaskMetadata};
use std::collections::HashMap;

/// Linear joint-space seed for one program group.
///
/// Joint targets are interpolated from the previous joint state; Cartesian
/// targets hold it (the solver, not the seed, is responsible for reaching
/// them). The starting state is the first joint waypoint found in the
/// program.
pub fn interpolate_group(
    program: &CompositeProgram,
    group: &ProgramGroup,
    steps_per_move: usize,
) -> Result<JointTrajectory, TaskError> {
    let start = program
        .groups
        .iter()
        .flat_map(|g| &g.instructions)
        .find_map(|i| match &i.waypoint {
            Waypoint::Joint(joint) => Some(joint.position.clone()),
            Waypoint::Cartesian(_) => None,
        })
        .ok_or_else(|| {
            TaskError::InvalidConfiguration(
                "program contains no joint waypoint to seed from".to_string(),
            )
        })?;

    let mut trajectory = JointTrajectory::default();
    let mut current = start;
    trajectory.points.push(TrajectoryPoint {
        positions: current.clone(),
        time_from_start: 0.0,
    });

    for instruction in &group.instructions {
        let target = match &instruction.waypoint {
            Waypoint::Joint(joint) => {
                if joint.position.len() != current.len() {
                    return Err(TaskError::InvalidConfiguration(format!(
                        "joint waypoint dimension {} does not match seed dimension {}",
                        joint.position.len(),
                        current.len()
                    )));
                }
                joint.position.clone()
            }
            Waypoint::Cartesian(_) => current.clone(),
        };
        for step in 1..=steps_per_move {
            let t = step as f64 / steps_per_move as f64;
            let positions = current
                .iter()
                .zip(&target)
                .map(|(a, b)| a + (b - a) * t)
                .collect();
            let index = trajectory.points.len();
            trajectory.points.push(TrajectoryPoint {
                positions,
                time_from_start: index as f64,
            });
        }
        current = target;
    }

    Ok(trajectory)
}

/// Generates the interpolated seed trajectory a planner refines.
pub struct SeedTask {
    steps_per_move: usize,
}

pub const SEED_TASK_TYPE: &str = "plan.seed";
const DEFAULT_STEPS_PER_MOVE: usize = 5;

#[async_trait]
impl Task for SeedTask {
    fn task_type(&self) -> &str {
        SEED_TASK_TYPE
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
        let program = value.as_program().ok_or_else(|| TaskError::InvalidInputType {
            key: program_key.clone(),
            expected: "program".to_string(),
            actual: value.type_name().to_string(),
        })?;

        let group = program.groups.get(group_index).ok_or_else(|| {
            TaskError::InvalidConfiguration(format!(
                "program has {} groups, seed expects group {}",
                program.groups.len(),
                group_index
            ))
        })?;

        let seed = interpolate_group(program, group, self.steps_per_move)?;
        ctx.events
            .info(format!("seeded {} points for group {}", seed.len(), group_index));

        let output_key = ctx.output_keys.first().cloned().ok_or_else(|| {
            TaskError::InvalidConfiguration("seed task declares no output key".into())
        })?;
        Ok(TaskOutcome::succeeded().with_output(output_key, seed))
    }
}

pub struct SeedTaskFactory;

impl TaskFactory for SeedTaskFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Box<dyn Task>, TaskError> {
        let steps_per_move = config
            .get("steps_per_move")
            .and_then(|v| v.as_f64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_STEPS_PER_MOVE);
        Ok(Box::new(SeedTask { steps_per_move }))
    }

    fn task_type(&self) -> &str {
        SEED_TASK_TYPE
    }

    fn metadata(&self) -> TaskMetadata {
        TaskMetadata {
            description: "Interpolate a joint-space seed trajectory for one group".to_string(),
            category: "planning".to_string(),
            inputs: vec![PortDefinition {
                name: "program".to_string(),
                description: "composite program read through program_key".to_string(),
                required: true,
            }],
            outputs: vec![PortDefinition {
                name: "seed".to_string(),
                description: "interpolated joint trajectory".to_string(),
                required: true,
            }],
        }
    }
}
