use async_trait::async_trait;
use plancore::{JointTrajectory, Task, TaskContext, TaskError, TaskOutcome, Value};
use planruntime::{PortDefinition, TaskFactory, TaskMetadata};
use std::collections::HashMap;

pub const MERGE_TASK_TYPE: &str = "plan.merge";

/// Join stage: concatenates the per-group trajectories, in declared input
/// order, into the pipeline's output key.
pub struct MergeTrajectoriesTask;

#[async_trait]
impl Task for MergeTrajectoriesTask {
    fn task_type(&self) -> &str {
        MERGE_TASK_TYPE
    }

    async fn execute(&self, ctx: TaskContext) -> Result<TaskOutcome, TaskError> {
        let mut merged = JointTrajectory::default();
        for key in &ctx.input_keys {
            let value = ctx.require_input(key).await?;
            let piece = value
                .as_trajectory()
                .ok_or_else(|| TaskError::InvalidInputType {
                    key: key.clone(),
                    expected: "trajectory".to_string(),
                    actual: value.type_name().to_string(),
                })?;
            merged.concat(piece);
        }

        ctx.events.info(format!(
            "merged {} pieces into {} points",
            ctx.input_keys.len(),
            merged.len()
        ));

        let output_key = ctx.output_keys.first().cloned().ok_or_else(|| {
            TaskError::InvalidConfiguration("merge task declares no output key".into())
        })?;
        Ok(TaskOutcome::succeeded().with_output(output_key, merged))
    }
}

pub struct MergeTrajectoriesTaskFactory;

impl TaskFactory for MergeTrajectoriesTaskFactory {
    fn create(&self, _config: &HashMap<String, Value>) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(MergeTrajectoriesTask))
    }

    fn task_type(&self) -> &str {
        MERGE_TASK_TYPE
    }

    fn metadata(&self) -> TaskMetadata {
        TaskMetadata {
            description: "Concatenate per-group trajectories in order".to_string(),
            category: "planning".to_string(),
            inputs: vec![PortDefinition {
                name: "trajectories".to_string(),
                description: "declared input keys, one per group".to_string(),
                required: true,
            }],
            outputs: vec![PortDefinition {
                name: "trajectory".to_string(),
                description: "merged joint trajectory".to_string(),
                required: true,
            }],
        }
    }
}
