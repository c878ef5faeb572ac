use super::discovery::WorkspaceObjects;
use crate::error::{PlatformOp, RunError};
use graph_maker_platform::{AccessTarget, NewActor, Platform};
use tracing::info;

pub const LAYER_TITLE: &str = "Layer";

/// Container actors a run places its nodes under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphTarget {
    pub graph_id: String,
    pub layer_id: String,
}

/// Create the Graph and Layer actors, link them, and share both with every user.
pub(crate) async fn provision<P: Platform>(
    platform: &P,
    workspace_id: &str,
    reference: &str,
    objects: &WorkspaceObjects,
    users: &[i64],
) -> Result<GraphTarget, RunError> {
    // Empty reference: the client derives one from the clock.
    let graph = NewActor {
        title: reference.to_string(),
        form_id: objects.graph_form_id,
        ..Default::default()
    };
    let graph_id = platform.create_actor(&graph).await.op("create graph actor")?;
    grant_actor(platform, &graph_id, users).await?;

    let layer_id = platform
        .create_layer_actor(LAYER_TITLE, objects.layer_form_id)
        .await
        .op("create layer actor")?;
    platform
        .create_link(objects.link_type_id, workspace_id, &graph_id, &layer_id)
        .await
        .op("link graph to layer")?;
    grant_actor(platform, &layer_id, users).await?;

    info!("Provisioned graph {} with layer {}", graph_id, layer_id);
    Ok(GraphTarget { graph_id, layer_id })
}

async fn grant_actor<P: Platform>(
    platform: &P,
    actor_id: &str,
    users: &[i64],
) -> Result<(), RunError> {
    for &user in users {
        platform
            .grant_access(AccessTarget::Actor, actor_id, user)
            .await
            .op("grant actor access")?;
    }
    Ok(())
}
