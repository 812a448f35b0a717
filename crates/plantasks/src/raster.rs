use crate::merge::MERGE_TASK_TYPE;
use crate::planner::MOTION_PLAN_TASK_TYPE;
use crate::profiles::{PLAN_PROFILE_KIND, SOLVER_PROFILE_KIND};
use crate::seed::SEED_TASK_TYPE;
use plancore::{
    profile_name, ComposeError, CompositeProgram, EdgeCondition, GraphError, NodeSpec,
    ProfileDictionary, ProfileError, ProgramGroup, TaskGraph,
};
use std::sync::Arc;

/// Storage key a sub-pipeline writes its trajectory under.
pub fn trajectory_key(label: &str) -> String {
    format!("{}/trajectory", label)
}

fn seed_key(label: &str) -> String {
    format!("{}/seed", label)
}

/// Builds the sub-graph planning one segment or transition group.
///
/// The raster builder is handed one builder per group kind, so segment and
/// transition pipelines can be swapped without touching the chain assembly.
pub trait SubPipelineBuilder: Send + Sync {
    fn build(
        &self,
        label: &str,
        program_key: &str,
        group_index: usize,
        group: &ProgramGroup,
    ) -> Result<TaskGraph, ComposeError>;
}

/// Segment pipeline: interpolated seed feeding a conditional planner node.
pub struct SegmentPipelineBuilder {
    pub steps_per_move: usize,
}

impl Default for SegmentPipelineBuilder {
    fn default() -> Self {
        Self { steps_per_move: 5 }
    }
}

impl SubPipelineBuilder for SegmentPipelineBuilder {
    fn build(
        &self,
        label: &str,
        program_key: &str,
        group_index: usize,
        _group: &ProgramGroup,
    ) -> Result<TaskGraph, ComposeError> {
        let mut graph = TaskGraph::new(label);
        let seed = graph.add_node(
            NodeSpec::task("seed", SEED_TASK_TYPE)
                .with_config("program_key", program_key)
                .with_config("group_index", group_index)
                .with_config("steps_per_move", self.steps_per_move)
                .with_input(program_key)
                .with_output(seed_key(label)),
        );
        let plan = graph.add_node(
            NodeSpec::task("plan", MOTION_PLAN_TASK_TYPE)
                .with_config("program_key", program_key)
                .with_config("seed_key", seed_key(label))
                .with_config("group_index", group_index)
                .with_input(program_key)
                .with_input(seed_key(label))
                .with_output(trajectory_key(label))
                .conditional(),
        );
        graph.connect(seed, EdgeCondition::OnSuccess, plan);
        Ok(graph)
    }
}

/// Transition pipeline: a single conditional planner node seeding itself.
#[derive(Default)]
pub struct TransitionPipelineBuilder;

impl SubPipelineBuilder for TransitionPipelineBuilder {
    fn build(
        &self,
        label: &str,
        program_key: &str,
        group_index: usize,
        _group: &ProgramGroup,
    ) -> Result<TaskGraph, ComposeError> {
        let mut graph = TaskGraph::new(label);
        graph.add_node(
            NodeSpec::task("plan", MOTION_PLAN_TASK_TYPE)
                .with_config("program_key", program_key)
                .with_config("group_index", group_index)
                .with_input(program_key)
                .with_output(trajectory_key(label))
                .conditional(),
        );
        Ok(graph)
    }
}

/// Expands a raster-style composite program into an executable graph whose
/// shape mirrors the program: one sub-graph per segment and transition,
/// chained in order, closed by a merge join.
pub struct RasterPipelineBuilder {
    segment: Arc<dyn SubPipelineBuilder>,
    transition: Arc<dyn SubPipelineBuilder>,
}

impl RasterPipelineBuilder {
    pub fn new(
        segment: Arc<dyn SubPipelineBuilder>,
        transition: Arc<dyn SubPipelineBuilder>,
    ) -> Self {
        Self {
            segment,
            transition,
        }
    }

    pub fn standard() -> Self {
        Self::new(
            Arc::new(SegmentPipelineBuilder::default()),
            Arc::new(TransitionPipelineBuilder),
        )
    }

    /// Build the pipeline graph for `program`.
    ///
    /// The alternating segment/transition shape is read from the live program
    /// on every call. Shape violations and unresolvable profile references
    /// abort the build; no partial graph is returned.
    pub fn build_pipeline(
        &self,
        program: &CompositeProgram,
        profiles: &ProfileDictionary,
        input_key: &str,
        output_key: &str,
    ) -> Result<TaskGraph, ComposeError> {
        if program.groups.is_empty() {
            return Err(GraphError::InvalidInput(
                "composite program has no segments".to_string(),
            )
            .into());
        }
        if program.groups.len() % 2 == 0 {
            return Err(GraphError::InvalidInput(format!(
                "expected alternating segments and transitions ending on a segment, got {} groups",
                program.groups.len()
            ))
            .into());
        }
        for (index, group) in program.groups.iter().enumerate() {
            if group.is_empty() {
                return Err(GraphError::InvalidInput(format!(
                    "group {} has no instructions",
                    index
                ))
                .into());
            }
        }
        check_profiles(program, profiles)?;

        let mut graph = TaskGraph::new("raster-pipeline");
        let mut previous = None;
        let mut group_outputs = Vec::with_capacity(program.groups.len());

        for (index, group) in program.groups.iter().enumerate() {
            let (label, builder) = if index % 2 == 0 {
                (format!("segment-{}", index / 2), &self.segment)
            } else {
                (format!("transition-{}", index / 2), &self.transition)
            };
            let subgraph = builder.build(&label, input_key, index, group)?;
            group_outputs.push(trajectory_key(&label));
            let node = graph.add_node(
                NodeSpec::graph(label.clone(), subgraph)
                    .with_input(input_key)
                    .with_output(trajectory_key(&label)),
            );
            if let Some(previous) = previous {
                graph.connect(previous, EdgeCondition::OnSuccess, node);
            }
            previous = Some(node);
        }

        let mut merge = NodeSpec::task("merge", MERGE_TASK_TYPE).with_output(output_key);
        for key in &group_outputs {
            merge = merge.with_input(key.clone());
        }
        let merge = graph.add_node(merge);
        if let Some(previous) = previous {
            graph.connect(previous, EdgeCondition::OnSuccess, merge);
        }

        graph.validate()?;
        Ok(graph)
    }
}

/// Every profile name a group or instruction references must resolve at
/// build time, for both the plan and solver capability kinds.
fn check_profiles(
    program: &CompositeProgram,
    profiles: &ProfileDictionary,
) -> Result<(), ProfileError> {
    for group in &program.groups {
        for kind in [PLAN_PROFILE_KIND, SOLVER_PROFILE_KIND] {
            let group_name = profile_name(None, group.profile.as_deref());
            if !profiles.resolves(kind, group_name) {
                return Err(ProfileError::NotFound {
                    kind: kind.to_string(),
                    name: group_name.to_string(),
                });
            }
            for instruction in &group.instructions {
                let name = profile_name(instruction.profile.as_deref(), group.profile.as_deref());
                if !profiles.resolves(kind, name) {
                    return Err(ProfileError::NotFound {
                        kind: kind.to_string(),
                        name: name.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Convenience entry point using the standard segment/transition builders.
pub fn build_pipeline(
    program: &CompositeProgram,
    profiles: &ProfileDictionary,
    input_key: &str,
    output_key: &str,
) -> Result<TaskGraph, ComposeError> {
    RasterPipelineBuilder::standard().build_pipeline(program, profiles, input_key, output_key)
}
