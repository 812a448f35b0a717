use crate::{GraphError, Value};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type NodeId = Uuid;

/// Terminal status returned by a task.
///
/// `Branch` is a success carrying a selector for conditional dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Succeeded,
    Branch(u32),
    Failed,
}

impl TaskStatus {
    pub fn succeeded(&self) -> bool {
        !matches!(self, TaskStatus::Failed)
    }
}

/// Predicate on an edge deciding whether it fires for a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeCondition {
    /// Fires for any terminal status.
    Always,
    /// Fires for `Succeeded` or any `Branch`.
    OnSuccess,
    OnFailure,
    OnBranch(u32),
}

impl EdgeCondition {
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            EdgeCondition::Always => true,
            EdgeCondition::OnSuccess => status.succeeded(),
            EdgeCondition::OnFailure => status == TaskStatus::Failed,
            EdgeCondition::OnBranch(branch) => status == TaskStatus::Branch(*branch),
        }
    }
}

/// What a node executes: a registered leaf task or an owned subgraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeKind {
    Task {
        task_type: String,
        #[serde(default)]
        config: HashMap<String, Value>,
    },
    Graph(TaskGraph),
}

/// Node definition inside a graph.
///
/// Input and output keys are fixed at construction time; the engine checks
/// inputs exist before dispatch and commits outputs only on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub input_keys: Vec<String>,
    #[serde(default)]
    pub output_keys: Vec<String>,
    /// If true the returned status selects which outgoing edges fire.
    #[serde(default)]
    pub is_conditional: bool,
}

impl NodeSpec {
    pub fn task(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind: NodeKind::Task {
                task_type: task_type.into(),
                config: HashMap::new(),
            },
            input_keys: Vec::new(),
            output_keys: Vec::new(),
            is_conditional: false,
        }
    }

    pub fn graph(name: impl Into<String>, graph: TaskGraph) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind: NodeKind::Graph(graph),
            input_keys: Vec::new(),
            output_keys: Vec::new(),
            is_conditional: false,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let NodeKind::Task { config, .. } = &mut self.kind {
            config.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_input(mut self, key: impl Into<String>) -> Self {
        self.input_keys.push(key.into());
        self
    }

    pub fn with_output(mut self, key: impl Into<String>) -> Self {
        self.output_keys.push(key.into());
        self
    }

    pub fn conditional(mut self) -> Self {
        self.is_conditional = true;
        self
    }
}

/// Directed edge activated when `condition` matches the source status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub condition: EdgeCondition,
    pub to: NodeId,
}

/// Directed graph of task nodes with conditional edges.
///
/// A graph is itself usable as a node (`NodeKind::Graph`), so pipelines
/// compose recursively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGraph {
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<Edge>,
}

impl TaskGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id;
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, from: NodeId, condition: EdgeCondition, to: NodeId) {
        self.edges.push(Edge {
            from,
            condition,
            to,
        });
    }

    pub fn find_node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn outgoing_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn incoming_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// The unique node with no incoming edges, if the graph is well formed.
    pub fn entry_node(&self) -> Option<&NodeSpec> {
        self.nodes
            .iter()
            .find(|n| !self.edges.iter().any(|e| e.to == n.id))
    }

    /// Nodes with no outgoing edges.
    pub fn terminal_nodes(&self) -> Vec<&NodeSpec> {
        self.nodes
            .iter()
            .filter(|n| !self.edges.iter().any(|e| e.from == n.id))
            .collect()
    }

    /// Construction-time validation, recursive into subgraphs.
    ///
    /// Checks edge endpoints, single entry, acyclicity, conditional-edge
    /// rules, and unique output-key ownership across the whole tree. A graph
    /// failing any check must never reach the executor.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::NoEntryNode(self.name.clone()));
        }

        let ids: HashMap<NodeId, &NodeSpec> = self.nodes.iter().map(|n| (n.id, n)).collect();
        for edge in &self.edges {
            if !ids.contains_key(&edge.from) {
                return Err(GraphError::NodeNotFound(edge.from.to_string()));
            }
            if !ids.contains_key(&edge.to) {
                return Err(GraphError::NodeNotFound(edge.to.to_string()));
            }
        }

        let entries: Vec<&NodeSpec> = self
            .nodes
            .iter()
            .filter(|n| !self.edges.iter().any(|e| e.to == n.id))
            .collect();
        match entries.len() {
            0 => return Err(GraphError::NoEntryNode(self.name.clone())),
            1 => {}
            _ => {
                return Err(GraphError::MultipleEntryNodes {
                    graph: self.name.clone(),
                    nodes: entries.iter().map(|n| n.name.clone()).collect(),
                })
            }
        }

        // Cycle check over the full edge relation. With a single entry node
        // any cycle would either strand nodes or loop the reachable set, so
        // cycles are rejected wholesale.
        let mut dag = DiGraph::<NodeId, ()>::new();
        let mut index = HashMap::new();
        for node in &self.nodes {
            index.insert(node.id, dag.add_node(node.id));
        }
        for edge in &self.edges {
            dag.add_edge(index[&edge.from], index[&edge.to], ());
        }
        if toposort(&dag, None).is_err() {
            return Err(GraphError::CyclicDependency(self.name.clone()));
        }

        for node in &self.nodes {
            if !node.is_conditional {
                let outgoing: Vec<&Edge> = self.outgoing_edges(node.id).collect();
                if outgoing.len() > 1 {
                    return Err(GraphError::InvalidEdge(format!(
                        "non-conditional node '{}' has {} outgoing edges",
                        node.name,
                        outgoing.len()
                    )));
                }
                if let Some(edge) = outgoing.first() {
                    if !matches!(
                        edge.condition,
                        EdgeCondition::Always | EdgeCondition::OnSuccess
                    ) {
                        return Err(GraphError::InvalidEdge(format!(
                            "non-conditional node '{}' has a {:?} edge",
                            node.name, edge.condition
                        )));
                    }
                }
            }
        }

        let mut owners: HashMap<String, String> = HashMap::new();
        self.collect_output_owners(&mut owners, "")?;

        for node in &self.nodes {
            if let NodeKind::Graph(sub) = &node.kind {
                sub.validate()?;
            }
        }

        Ok(())
    }

    /// Output keys are owned by leaf nodes; a composite's declared outputs
    /// describe what its subtree produces and are not independent writes.
    fn collect_output_owners(
        &self,
        owners: &mut HashMap<String, String>,
        prefix: &str,
    ) -> Result<(), GraphError> {
        for node in &self.nodes {
            let qualified = if prefix.is_empty() {
                node.name.clone()
            } else {
                format!("{}/{}", prefix, node.name)
            };
            match &node.kind {
                NodeKind::Task { .. } => {
                    for key in &node.output_keys {
                        if let Some(first) = owners.insert(key.clone(), qualified.clone()) {
                            return Err(GraphError::DuplicateOutputKey {
                                key: key.clone(),
                                first,
                                second: qualified,
                            });
                        }
                    }
                }
                NodeKind::Graph(sub) => {
                    sub.collect_output_owners(owners, &qualified)?;
                }
            }
        }
        Ok(())
    }

    /// Structural summary independent of generated ids. Two graphs built from
    /// equivalent inputs compare equal.
    pub fn topology(&self) -> GraphTopology {
        let names: HashMap<NodeId, &str> =
            self.nodes.iter().map(|n| (n.id, n.name.as_str())).collect();
        let mut edges: Vec<(String, String, String)> = self
            .edges
            .iter()
            .map(|e| {
                (
                    names[&e.from].to_string(),
                    format!("{:?}", e.condition),
                    names[&e.to].to_string(),
                )
            })
            .collect();
        edges.sort();
        GraphTopology {
            name: self.name.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeTopology {
                    name: n.name.clone(),
                    kind: match &n.kind {
                        NodeKind::Task { task_type, .. } => task_type.clone(),
                        NodeKind::Graph(_) => "graph".to_string(),
                    },
                    is_conditional: n.is_conditional,
                    input_keys: n.input_keys.clone(),
                    output_keys: n.output_keys.clone(),
                    subgraph: match &n.kind {
                        NodeKind::Graph(sub) => Some(Box::new(sub.topology())),
                        NodeKind::Task { .. } => None,
                    },
                })
                .collect(),
            edges,
        }
    }
}

/// Id-free shape of a graph, used for structural-equivalence checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphTopology {
    pub name: String,
    pub nodes: Vec<NodeTopology>,
    pub edges: Vec<(String, String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeTopology {
    pub name: String,
    pub kind: String,
    pub is_conditional: bool,
    pub input_keys: Vec<String>,
    pub output_keys: Vec<String>,
    pub subgraph: Option<Box<GraphTopology>>,
}
