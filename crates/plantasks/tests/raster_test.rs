use plancore::{
    ComposeError, CompositeProgram, GraphError, JointWaypoint, ManipulatorInfo, MoveInstruction,
    NodeKind, ProfileDictionary, ProgramGroup, Waypoint, DEFAULT_PROFILE,
};
use plantasks::profiles::{default_profile_dictionary, register_plan_profile, DefaultPlanProfile};
use plantasks::{build_pipeline, MERGE_TASK_TYPE};

fn joint_move(position: Vec<f64>) -> MoveInstruction {
    MoveInstruction::new(Waypoint::Joint(JointWaypoint::new(position)))
}

fn sample_program(segments: usize) -> CompositeProgram {
    let manipulator = ManipulatorInfo::new("manipulator", "tool0", "part");
    let mut program = CompositeProgram::new("raster", manipulator);
    for i in 0..segments {
        program.add_group(ProgramGroup::new(vec![
            joint_move(vec![i as f64, 0.0]),
            joint_move(vec![i as f64, 1.0]),
        ]));
        if i + 1 < segments {
            program.add_group(ProgramGroup::new(vec![joint_move(vec![
                i as f64 + 0.5,
                0.5,
            ])]));
        }
    }
    program
}

#[test]
fn pipeline_shape_mirrors_program_shape() {
    let profiles = default_profile_dictionary();
    let graph = build_pipeline(&sample_program(3), &profiles, "program", "trajectory").unwrap();

    let names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "segment-0",
            "transition-0",
            "segment-1",
            "transition-1",
            "segment-2",
            "merge"
        ]
    );

    // Strict chain, then the join.
    assert_eq!(graph.edges.len(), 5);
    let topology = graph.topology();
    for (_, condition, _) in &topology.edges {
        assert_eq!(condition, "OnSuccess");
    }

    // Segments carry a seed stage, transitions plan directly.
    for node in &graph.nodes {
        match &node.kind {
            NodeKind::Graph(sub) if node.name.starts_with("segment-") => {
                assert_eq!(sub.nodes.len(), 2);
            }
            NodeKind::Graph(sub) => {
                assert_eq!(sub.nodes.len(), 1);
            }
            NodeKind::Task { task_type, .. } => {
                assert_eq!(task_type, MERGE_TASK_TYPE);
            }
        }
    }

    // The merge reads every group output in program order.
    let merge = graph.find_node_by_name("merge").unwrap();
    assert_eq!(
        merge.input_keys,
        vec![
            "segment-0/trajectory",
            "transition-0/trajectory",
            "segment-1/trajectory",
            "transition-1/trajectory",
            "segment-2/trajectory"
        ]
    );
    assert_eq!(merge.output_keys, vec!["trajectory"]);
}

#[test]
fn single_segment_builds_without_transitions() {
    let profiles = default_profile_dictionary();
    let graph = build_pipeline(&sample_program(1), &profiles, "program", "trajectory").unwrap();

    let names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["segment-0", "merge"]);
    assert_eq!(graph.edges.len(), 1);
}

#[test]
fn empty_program_is_invalid_input() {
    let profiles = default_profile_dictionary();
    let program = CompositeProgram::new("empty", ManipulatorInfo::new("m", "t", "w"));

    match build_pipeline(&program, &profiles, "program", "trajectory") {
        Err(ComposeError::Graph(GraphError::InvalidInput(_))) => {}
        other => panic!("expected InvalidInput, got {:?}", other.map(|g| g.name)),
    }
}

#[test]
fn broken_alternation_is_invalid_input() {
    let profiles = default_profile_dictionary();
    let mut program = sample_program(2);
    // Drop the trailing segment so the program ends on a transition.
    program.groups.pop();

    match build_pipeline(&program, &profiles, "program", "trajectory") {
        Err(ComposeError::Graph(GraphError::InvalidInput(_))) => {}
        other => panic!("expected InvalidInput, got {:?}", other.map(|g| g.name)),
    }
}

#[test]
fn empty_group_is_invalid_input() {
    let profiles = default_profile_dictionary();
    let mut program = sample_program(2);
    program.groups[1].instructions.clear();

    assert!(matches!(
        build_pipeline(&program, &profiles, "program", "trajectory"),
        Err(ComposeError::Graph(GraphError::InvalidInput(_)))
    ));
}

#[test]
fn build_is_structurally_idempotent() {
    let profiles = default_profile_dictionary();
    let first = build_pipeline(&sample_program(4), &profiles, "program", "trajectory").unwrap();
    let second = build_pipeline(&sample_program(4), &profiles, "program", "trajectory").unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.topology(), second.topology());
}

#[test]
fn shape_is_reread_from_the_live_program() {
    let profiles = default_profile_dictionary();
    let builder = plantasks::RasterPipelineBuilder::standard();

    let small = builder
        .build_pipeline(&sample_program(2), &profiles, "program", "trajectory")
        .unwrap();
    let large = builder
        .build_pipeline(&sample_program(5), &profiles, "program", "trajectory")
        .unwrap();

    // 2 segments + 1 transition + merge, then 5 + 4 + merge.
    assert_eq!(small.nodes.len(), 4);
    assert_eq!(large.nodes.len(), 10);
}

#[test]
fn unresolvable_profile_aborts_the_build() {
    // No DEFAULT under any kind: every reference must resolve exactly.
    let profiles = ProfileDictionary::new();

    match build_pipeline(&sample_program(1), &profiles, "program", "trajectory") {
        Err(ComposeError::Profile(e)) => {
            assert!(e.to_string().contains(DEFAULT_PROFILE));
        }
        other => panic!("expected ProfileNotFound, got {:?}", other.map(|g| g.name)),
    }
}

#[test]
fn named_profile_reference_resolves_against_dictionary() {
    let mut profiles = default_profile_dictionary();
    register_plan_profile(&mut profiles, "fine", DefaultPlanProfile::default());

    let mut program = sample_program(1);
    program.groups[0].instructions[0].profile = Some("fine".to_string());
    assert!(build_pipeline(&program, &profiles, "program", "trajectory").is_ok());

    // An unknown name still resolves through DEFAULT.
    program.groups[0].instructions[0].profile = Some("unknown".to_string());
    assert!(build_pipeline(&program, &profiles, "program", "trajectory").is_ok());
}
