use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A graph as produced by the completion model.
///
/// Node ids are local to one completion response; they are never platform
/// identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Graph {
    /// The nodes in the graph
    pub nodes: Vec<Node>,
    /// The edges in the graph
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Node {
    /// The unique identifier of the node
    pub id: String,
    /// The name of the node
    pub name: String,
    /// The x-coordinate of the node, tree view of graph, the distance between actors must be no less than 3, 0 - center
    pub x: i64,
    /// The y-coordinate of the node, tree view of graph, the distance between actors must be no less than 3, 0 - center
    pub y: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Edge {
    /// The source node of the edge
    pub source: String,
    /// The target node of the edge
    pub target: String,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Append another graph's nodes and edges, keeping input order.
    pub fn append(&mut self, other: Graph) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>, x: i64, y: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            x,
            y,
        }
    }
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}
