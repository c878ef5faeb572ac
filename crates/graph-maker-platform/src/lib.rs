mod client;
mod protocol;

pub use client::{PlatformClient, PlatformConfig};
pub use protocol::*;

use anyhow::Result;
use graph_maker_core::form_schema::Section;
use std::future::Future;

/// The subset of the platform API graph construction needs.
///
/// Every operation is a single authenticated call. `PlatformClient` talks to
/// the live API; tests substitute recording fakes.
pub trait Platform: Send + Sync {
    /// System form templates of a workspace. `None` when the platform returned no data.
    fn system_forms(
        &self,
        workspace_id: &str,
    ) -> impl Future<Output = Result<Option<Vec<FormTemplate>>>> + Send;

    /// Custom form templates of a workspace.
    fn custom_forms(
        &self,
        workspace_id: &str,
    ) -> impl Future<Output = Result<Option<Vec<FormTemplate>>>> + Send;

    fn link_types(
        &self,
        workspace_id: &str,
    ) -> impl Future<Output = Result<Option<Vec<LinkType>>>> + Send;

    /// Create a form template and return its numeric id.
    fn create_form_template(
        &self,
        workspace_id: &str,
        title: &str,
        sections: &[Section],
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Grant a user view, modify and remove rights on an object.
    fn grant_access(
        &self,
        target: AccessTarget,
        object_id: &str,
        user_id: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    fn create_actor(&self, actor: &NewActor) -> impl Future<Output = Result<String>> + Send;

    /// Create a layer actor (`data.type = "graph"`) under the given form.
    fn create_layer_actor(
        &self,
        title: &str,
        form_id: i64,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Create a curved link between two actors and return the link id.
    fn create_link(
        &self,
        link_type: i64,
        workspace_id: &str,
        source: &str,
        target: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Place an actor on a layer and return its placement id.
    fn add_actor_to_layer(
        &self,
        layer_id: &str,
        actor_id: &str,
        position: Position,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Draw a link on a layer between two existing placements.
    fn add_edge_to_layer(
        &self,
        layer_id: &str,
        link_id: &str,
        source_placement: i64,
        target_placement: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    fn create_comment(
        &self,
        record_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}
