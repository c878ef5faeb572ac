//! Replays a decoded [`Graph`] onto a platform layer.
//!
//! Nodes are replayed first and produce an [`IdMap`]; the edge pass only
//! reads it. A map belongs to one completion response and is dropped with it.

use super::discovery::WorkspaceObjects;
use crate::error::{PlatformOp, RunError};
use anyhow::anyhow;
use graph_maker_core::{Graph, Node, validate_graph};
use graph_maker_platform::{NewActor, Platform, Position};
use std::collections::HashMap;
use tracing::{debug, info};

/// Canvas units per layout unit of the completion model.
pub const GRID_SCALE: i64 = 50;

/// Platform objects created for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub actor_id: String,
    pub placement_id: i64,
}

/// Local node id -> platform reference -> placement.
///
/// Two nodes with the same name share a reference; the later one wins.
#[derive(Debug, Default)]
pub struct IdMap {
    references: HashMap<String, String>,
    placements: HashMap<String, Placement>,
}

impl IdMap {
    fn insert(&mut self, node_id: &str, reference: String, placement: Placement) {
        self.references.insert(node_id.to_string(), reference.clone());
        self.placements.insert(reference, placement);
    }

    pub fn resolve(&self, node_id: &str) -> Result<&Placement, RunError> {
        self.references
            .get(node_id)
            .and_then(|reference| self.placements.get(reference))
            .ok_or_else(|| RunError::UnresolvedNode(node_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// Scale a node's layout coordinates onto the canvas.
fn canvas_position(node: &Node) -> Result<Position, RunError> {
    let scale = |v: i64| v.checked_mul(GRID_SCALE);
    match (scale(node.x), scale(node.y)) {
        (Some(x), Some(y)) => Ok(Position { x, y }),
        _ => Err(RunError::Completion(anyhow!(
            "node {} coordinate out of range",
            node.id
        ))),
    }
}

/// Platform reference of a node: `<reference>.<name>`, form-urlencoded.
pub fn node_reference(reference: &str, name: &str) -> String {
    let raw = format!("{}.{}", reference, name);
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

pub(crate) async fn replay<P: Platform>(
    platform: &P,
    workspace_id: &str,
    reference: &str,
    objects: &WorkspaceObjects,
    layer_id: &str,
    graph: &Graph,
) -> Result<(), RunError> {
    if let Err(err) = validate_graph(graph) {
        return Err(RunError::UnresolvedNode(err.node_id().to_string()));
    }

    let positions = graph
        .nodes
        .iter()
        .map(canvas_position)
        .collect::<Result<Vec<_>, _>>()?;

    let ids = replay_nodes(
        platform, reference, objects, layer_id, graph, &positions,
    )
    .await?;
    replay_edges(platform, workspace_id, objects, layer_id, graph, &ids).await?;

    info!(
        "Replayed {} nodes and {} edges onto layer {}",
        graph.nodes.len(),
        graph.edges.len(),
        layer_id
    );
    Ok(())
}

async fn replay_nodes<P: Platform>(
    platform: &P,
    reference: &str,
    objects: &WorkspaceObjects,
    layer_id: &str,
    graph: &Graph,
    positions: &[Position],
) -> Result<IdMap, RunError> {
    let mut ids = IdMap::default();

    for (node, &position) in graph.nodes.iter().zip(positions) {
        let node_ref = node_reference(reference, &node.name);
        let actor = NewActor {
            reference: node_ref.clone(),
            title: node.name.clone(),
            form_id: objects.node_form_id,
            ..Default::default()
        };
        let actor_id = platform.create_actor(&actor).await.op("create node actor")?;

        let placement_id = platform
            .add_actor_to_layer(layer_id, &actor_id, position)
            .await
            .op("place node on layer")?;

        debug!(
            "Node {} -> actor {} (placement {})",
            node.id, actor_id, placement_id
        );
        ids.insert(
            &node.id,
            node_ref,
            Placement {
                actor_id,
                placement_id,
            },
        );
    }

    Ok(ids)
}

async fn replay_edges<P: Platform>(
    platform: &P,
    workspace_id: &str,
    objects: &WorkspaceObjects,
    layer_id: &str,
    graph: &Graph,
    ids: &IdMap,
) -> Result<(), RunError> {
    for edge in &graph.edges {
        let source = ids.resolve(&edge.source)?;
        let target = ids.resolve(&edge.target)?;

        let link_id = platform
            .create_link(
                objects.link_type_id,
                workspace_id,
                &source.actor_id,
                &target.actor_id,
            )
            .await
            .op("create node link")?;
        platform
            .add_edge_to_layer(
                layer_id,
                &link_id,
                source.placement_id,
                target.placement_id,
            )
            .await
            .op("place link on layer")?;

        debug!("Edge {} -> {} as link {}", edge.source, edge.target, link_id);
    }
    Ok(())
}
