use graph_maker_core::form_schema::Section;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope of every platform response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
}

/// A form template as listed by the forms endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormTemplate {
    pub id: i64,
    pub title: String,
}

/// A link (edge) type of a workspace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatedForm {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatedObject {
    pub id: String,
}

/// Object kinds access rules can be granted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTarget {
    FormTemplate,
    TemplateActors,
    Actor,
}

impl AccessTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTarget::FormTemplate => "formTemplate",
            AccessTarget::TemplateActors => "templateActors",
            AccessTarget::Actor => "actor",
        }
    }
}

/// Kind of item placed on a graph layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerItemKind {
    Node,
    Edge,
}

/// One batched action of the access-rule and layer endpoints.
#[derive(Debug, Serialize)]
pub struct Action<T> {
    pub action: &'static str,
    pub data: T,
}

impl<T> Action<T> {
    pub fn create(data: T) -> Self {
        Self {
            action: "create",
            data,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    pub user_id: i64,
    pub privs: Privileges,
}

#[derive(Debug, Serialize)]
pub struct Privileges {
    pub view: bool,
    pub modify: bool,
    pub remove: bool,
}

impl Privileges {
    pub fn full() -> Self {
        Self {
            view: true,
            modify: true,
            remove: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FormTemplateRequest<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub settings: Map<String, Value>,
    pub sections: &'a [Section],
}

/// RGB colour of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parameters of a new actor. An empty `reference` is replaced with a
/// timestamp-based one by the client.
#[derive(Debug, Clone, Default)]
pub struct NewActor {
    pub reference: String,
    pub title: String,
    pub form_id: i64,
    pub data: Map<String, Value>,
    pub color: Option<Rgb>,
    pub picture_object: Option<Value>,
    pub picture: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest<'a> {
    #[serde(rename = "ref")]
    pub reference: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub picture: &'a str,
    pub data: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_object: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
pub struct LayerActorRequest<'a> {
    pub title: &'a str,
    pub data: LayerActorData,
}

#[derive(Debug, Serialize)]
pub struct LayerActorData {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Fields of an existing actor to change; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActorUpdate {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub edge_type_id: i64,
    pub curve_style: &'static str,
}

/// Canvas coordinates on a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Serialize)]
pub struct LayerNode<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: LayerItemKind,
    pub position: Position,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerEdgeRequest<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: LayerItemKind,
    pub la_id_source: i64,
    pub la_id_target: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerPlacementResult {
    #[serde(default)]
    pub nodes_map: Vec<PlacedNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedNode {
    pub la_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CommentRequest<'a> {
    pub description: &'a str,
    pub data: CommentData,
}

#[derive(Debug, Serialize)]
pub struct CommentData {
    pub rating: i64,
}

/// An actor as returned by the actor and layer endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub title: String,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub form_id: i64,
    #[serde(default)]
    pub position: Option<CanvasPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Contents of a graph layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LayerActors {
    #[serde(default)]
    pub nodes: Vec<Actor>,
    #[serde(default)]
    pub edges: Vec<LayerEdge>,
}

impl LayerActors {
    pub fn actor(&self, id: &str) -> Option<&Actor> {
        self.nodes.iter().find(|a| a.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}
