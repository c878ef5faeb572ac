use crate::error::{PlatformOp, RunError};
use graph_maker_platform::{AccessTarget, FormTemplate, Platform};
use tracing::{debug, info};

pub const GRAPH_FORM_TITLE: &str = "Graphs";
pub const LAYER_FORM_TITLE: &str = "Layers";
pub const NODE_FORM_TITLE: &str = "GraphMakerForm.";
pub const HIERARCHY_LINK_TYPE: &str = "hierarchy";

/// Identifiers a run needs from the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceObjects {
    pub graph_form_id: i64,
    pub layer_form_id: i64,
    pub node_form_id: i64,
    pub link_type_id: i64,
}

fn find_form(forms: &[FormTemplate], title: &str) -> Option<i64> {
    forms.iter().find(|f| f.title == title).map(|f| f.id)
}

/// Resolve the workspace's form and link type ids, creating the node form on
/// first use.
pub(crate) async fn discover<P: Platform>(
    platform: &P,
    workspace_id: &str,
    users: &[i64],
) -> Result<WorkspaceObjects, RunError> {
    let system = platform
        .system_forms(workspace_id)
        .await
        .op("list system forms")?
        .ok_or_else(|| RunError::PlatformState("no forms".to_string()))?;

    let graph_form_id = find_form(&system, GRAPH_FORM_TITLE).ok_or_else(|| {
        RunError::PlatformState(format!("no '{}' system form", GRAPH_FORM_TITLE))
    })?;
    let layer_form_id = find_form(&system, LAYER_FORM_TITLE).ok_or_else(|| {
        RunError::PlatformState(format!("no '{}' system form", LAYER_FORM_TITLE))
    })?;

    let custom = platform
        .custom_forms(workspace_id)
        .await
        .op("list custom forms")?
        .ok_or_else(|| RunError::PlatformState("no custom forms".to_string()))?;

    let node_form_id = match find_form(&custom, NODE_FORM_TITLE) {
        Some(id) => {
            debug!("Found node form {}", id);
            id
        }
        None => create_node_form(platform, workspace_id, users).await?,
    };

    let link_type_id = platform
        .link_types(workspace_id)
        .await
        .op("list link types")?
        .ok_or_else(|| RunError::PlatformState("no links".to_string()))?
        .iter()
        .find(|l| l.name == HIERARCHY_LINK_TYPE)
        .map(|l| l.id)
        .ok_or_else(|| {
            RunError::PlatformState(format!("no '{}' link type", HIERARCHY_LINK_TYPE))
        })?;

    Ok(WorkspaceObjects {
        graph_form_id,
        layer_form_id,
        node_form_id,
        link_type_id,
    })
}

async fn create_node_form<P: Platform>(
    platform: &P,
    workspace_id: &str,
    users: &[i64],
) -> Result<i64, RunError> {
    let form_id = platform
        .create_form_template(workspace_id, NODE_FORM_TITLE, &[])
        .await
        .op("create form template")?;
    info!("Created node form {} in workspace {}", form_id, workspace_id);

    let object_id = form_id.to_string();
    for &user in users {
        platform
            .grant_access(AccessTarget::FormTemplate, &object_id, user)
            .await
            .op("grant form access")?;
        platform
            .grant_access(AccessTarget::TemplateActors, &object_id, user)
            .await
            .op("grant form access")?;
    }
    Ok(form_id)
}
