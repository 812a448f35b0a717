use plancore::{
    EdgeCondition, GraphError, NodeSpec, TaskGraph, TaskStatus,
};

fn linear_chain() -> TaskGraph {
    let mut graph = TaskGraph::new("chain");
    let a = graph.add_node(NodeSpec::task("a", "test.emit").with_output("a/out"));
    let b = graph.add_node(
        NodeSpec::task("b", "test.emit")
            .with_input("a/out")
            .with_output("b/out"),
    );
    let c = graph.add_node(
        NodeSpec::task("c", "test.emit")
            .with_input("b/out")
            .with_output("c/out"),
    );
    graph.connect(a, EdgeCondition::OnSuccess, b);
    graph.connect(b, EdgeCondition::OnSuccess, c);
    graph
}

#[test]
fn valid_chain_passes_validation() {
    let graph = linear_chain();
    assert!(graph.validate().is_ok());
    assert_eq!(graph.entry_node().unwrap().name, "a");
    let terminals = graph.terminal_nodes();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].name, "c");
}

#[test]
fn cycle_is_rejected_at_construction() {
    let mut graph = TaskGraph::new("cyclic");
    let a = graph.add_node(NodeSpec::task("a", "test.emit"));
    let b = graph.add_node(NodeSpec::task("b", "test.emit").conditional());
    let c = graph.add_node(NodeSpec::task("c", "test.emit").conditional());
    graph.connect(a, EdgeCondition::OnSuccess, b);
    graph.connect(b, EdgeCondition::OnSuccess, c);
    graph.connect(c, EdgeCondition::OnSuccess, b);

    assert!(matches!(
        graph.validate(),
        Err(GraphError::CyclicDependency(_))
    ));
}

#[test]
fn empty_graph_has_no_entry() {
    let graph = TaskGraph::new("empty");
    assert!(matches!(graph.validate(), Err(GraphError::NoEntryNode(_))));
}

#[test]
fn multiple_entries_are_rejected() {
    let mut graph = TaskGraph::new("two-heads");
    let a = graph.add_node(NodeSpec::task("a", "test.emit"));
    graph.add_node(NodeSpec::task("b", "test.emit"));
    let c = graph.add_node(NodeSpec::task("c", "test.emit"));
    graph.connect(a, EdgeCondition::OnSuccess, c);

    match graph.validate() {
        Err(GraphError::MultipleEntryNodes { nodes, .. }) => {
            assert!(nodes.contains(&"a".to_string()));
            assert!(nodes.contains(&"b".to_string()));
        }
        other => panic!("expected MultipleEntryNodes, got {:?}", other),
    }
}

#[test]
fn duplicate_output_key_across_subgraphs_is_rejected() {
    let mut inner_a = TaskGraph::new("inner-a");
    inner_a.add_node(NodeSpec::task("writer", "test.emit").with_output("shared/key"));

    let mut inner_b = TaskGraph::new("inner-b");
    inner_b.add_node(NodeSpec::task("writer", "test.emit").with_output("shared/key"));

    let mut graph = TaskGraph::new("outer");
    let a = graph.add_node(NodeSpec::graph("first", inner_a));
    let b = graph.add_node(NodeSpec::graph("second", inner_b));
    graph.connect(a, EdgeCondition::OnSuccess, b);

    match graph.validate() {
        Err(GraphError::DuplicateOutputKey { key, first, second }) => {
            assert_eq!(key, "shared/key");
            assert_eq!(first, "first/writer");
            assert_eq!(second, "second/writer");
        }
        other => panic!("expected DuplicateOutputKey, got {:?}", other),
    }
}

#[test]
fn non_conditional_fan_out_is_rejected() {
    let mut graph = TaskGraph::new("fan");
    let a = graph.add_node(NodeSpec::task("a", "test.emit"));
    let b = graph.add_node(NodeSpec::task("b", "test.emit"));
    let c = graph.add_node(NodeSpec::task("c", "test.emit"));
    graph.connect(a, EdgeCondition::OnSuccess, b);
    graph.connect(a, EdgeCondition::OnSuccess, c);

    assert!(matches!(graph.validate(), Err(GraphError::InvalidEdge(_))));
}

#[test]
fn non_conditional_failure_edge_is_rejected() {
    let mut graph = TaskGraph::new("bad-edge");
    let a = graph.add_node(NodeSpec::task("a", "test.emit"));
    let b = graph.add_node(NodeSpec::task("b", "test.emit"));
    graph.connect(a, EdgeCondition::OnFailure, b);

    assert!(matches!(graph.validate(), Err(GraphError::InvalidEdge(_))));
}

#[test]
fn edge_conditions_match_statuses() {
    assert!(EdgeCondition::Always.matches(TaskStatus::Failed));
    assert!(EdgeCondition::OnSuccess.matches(TaskStatus::Succeeded));
    assert!(EdgeCondition::OnSuccess.matches(TaskStatus::Branch(2)));
    assert!(!EdgeCondition::OnSuccess.matches(TaskStatus::Failed));
    assert!(EdgeCondition::OnFailure.matches(TaskStatus::Failed));
    assert!(!EdgeCondition::OnFailure.matches(TaskStatus::Succeeded));
    assert!(EdgeCondition::OnBranch(1).matches(TaskStatus::Branch(1)));
    assert!(!EdgeCondition::OnBranch(1).matches(TaskStatus::Branch(2)));
    assert!(!EdgeCondition::OnBranch(1).matches(TaskStatus::Succeeded));
}

#[test]
fn topology_is_stable_across_rebuilds() {
    let first = linear_chain();
    let second = linear_chain();
    // Node ids differ between builds; the shape must not.
    assert_ne!(first.nodes[0].id, second.nodes[0].id);
    assert_eq!(first.topology(), second.topology());
}

#[test]
fn graph_serde_round_trip_preserves_topology() {
    let graph = linear_chain();
    let json = serde_json::to_string(&graph).unwrap();
    let restored: TaskGraph = serde_json::from_str(&json).unwrap();
    assert!(restored.validate().is_ok());
    assert_eq!(graph.topology(), restored.topology());
}
