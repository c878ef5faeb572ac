use crate::Graph;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Edge {index} references unknown source node '{id}'")]
    UnknownSource { index: usize, id: String },

    #[error("Edge {index} references unknown target node '{id}'")]
    UnknownTarget { index: usize, id: String },
}

impl GraphError {
    /// The local node id that failed to resolve.
    pub fn node_id(&self) -> &str {
        match self {
            GraphError::UnknownSource { id, .. } | GraphError::UnknownTarget { id, .. } => id,
        }
    }
}

/// Check that every edge endpoint names a node of the same graph.
///
/// Duplicate node ids are not rejected; the last occurrence wins when the
/// graph is replayed.
pub fn validate_graph(graph: &Graph) -> Result<(), GraphError> {
    let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    for (index, edge) in graph.edges.iter().enumerate() {
        if !ids.contains(edge.source.as_str()) {
            return Err(GraphError::UnknownSource {
                index,
                id: edge.source.clone(),
            });
        }
        if !ids.contains(edge.target.as_str()) {
            return Err(GraphError::UnknownTarget {
                index,
                id: edge.target.clone(),
            });
        }
    }

    Ok(())
}
