use crate::Platform;
use crate::protocol::*;
use anyhow::{Context, Result, anyhow};
use graph_maker_core::form_schema::Section;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Option<Duration>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.control.events/v/1.0".to_string(),
            token: String::new(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl PlatformConfig {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }
}

/// Authenticated client for the platform REST API.
pub struct PlatformClient {
    config: PlatformConfig,
    http: reqwest::Client,
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("Failed to build platform HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn call<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut req = self
            .http
            .request(method.clone(), self.url(path))
            .bearer_auth(&self.config.token);
        if let Some(body) = body {
            req = req.json(body);
        }

        debug!("Platform request: {} {}", method, path);

        let response = req
            .send()
            .await
            .with_context(|| format!("Failed to send platform request {} {}", method, path))?;
        self.decode(&method, path, response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        method: &Method,
        path: &str,
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read platform response for {} {}", method, path))?;

        debug!("Platform response: {} {} -> {}", method, path, status);

        if !status.is_success() {
            error!("Platform request {} {} failed ({}): {}", method, path, status, text);
            anyhow::bail!(
                "Platform request {} {} failed ({}): {}",
                method,
                path,
                status,
                text
            );
        }

        if text.trim().is_empty() {
            return Ok(None);
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse platform response for {} {}", method, path))?;
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.call::<Value, T>(Method::GET, path, None).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        self.call(Method::POST, path, Some(body)).await
    }

    /// Fetch one actor by id.
    pub async fn get_actor(&self, actor_id: &str) -> Result<Actor> {
        self.get(&format!("/actors/{}", actor_id))
            .await?
            .ok_or_else(|| anyhow!("Actor {} not found", actor_id))
    }

    /// Look an actor up by its reference within a form. `reference` must
    /// already be URL-safe.
    pub async fn get_actor_by_ref(&self, form_id: i64, reference: &str) -> Result<Option<Actor>> {
        self.get(&format!("/actors/ref/{}/{}", form_id, reference))
            .await
    }

    pub async fn update_actor(
        &self,
        form_id: i64,
        actor_id: &str,
        update: &ActorUpdate,
    ) -> Result<()> {
        self.call::<_, Value>(
            Method::PUT,
            &format!("/actors/actor/{}/{}", form_id, actor_id),
            Some(update),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_actor(&self, actor_id: &str) -> Result<()> {
        self.call::<Value, Value>(Method::DELETE, &format!("/actors/{}", actor_id), None)
            .await?;
        Ok(())
    }

    /// Nodes and edges currently placed on a layer.
    pub async fn get_layer_actors(&self, layer_id: &str) -> Result<LayerActors> {
        Ok(self
            .get(&format!("/graph_layers/{}", layer_id))
            .await?
            .unwrap_or_default())
    }

    /// Upload a file to the workspace's storage as multipart form data.
    pub async fn upload_file(
        &self,
        workspace_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile> {
        let path = format!("/upload/{}", workspace_id);
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        debug!("Platform upload: POST {} ({})", path, file_name);

        let response = self
            .http
            .post(self.url(&path))
            .bearer_auth(&self.config.token)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to upload {}", file_name))?;

        self.decode(&Method::POST, &path, response)
            .await?
            .ok_or_else(|| anyhow!("Upload of {} returned no file", file_name))
    }
}

impl Platform for PlatformClient {
    async fn system_forms(&self, workspace_id: &str) -> Result<Option<Vec<FormTemplate>>> {
        self.get(&format!(
            "/forms/templates/system/{}?formTypes=system",
            workspace_id
        ))
        .await
    }

    async fn custom_forms(&self, workspace_id: &str) -> Result<Option<Vec<FormTemplate>>> {
        self.get(&format!("/forms/templates/{}", workspace_id))
            .await
    }

    async fn link_types(&self, workspace_id: &str) -> Result<Option<Vec<LinkType>>> {
        self.get(&format!("/edge_types/{}", workspace_id)).await
    }

    async fn create_form_template(
        &self,
        workspace_id: &str,
        title: &str,
        sections: &[Section],
    ) -> Result<i64> {
        let body = FormTemplateRequest {
            title,
            description: "",
            settings: Map::new(),
            sections,
        };
        let created: CreatedForm = self
            .post(&format!("/forms/{}/true", workspace_id), &body)
            .await?
            .ok_or_else(|| anyhow!("Form template creation returned no id"))?;
        Ok(created.id)
    }

    async fn grant_access(&self, target: AccessTarget, object_id: &str, user_id: i64) -> Result<()> {
        let body = [Action::create(AccessRule {
            user_id,
            privs: Privileges::full(),
        })];
        self.post::<_, Value>(
            &format!("/access_rules/{}/{}", target.as_str(), object_id),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn create_actor(&self, actor: &NewActor) -> Result<String> {
        let generated;
        let reference = if actor.reference.is_empty() {
            generated = generated_reference();
            generated.as_str()
        } else {
            actor.reference.as_str()
        };

        let body = ActorRequest {
            reference,
            title: &actor.title,
            description: "",
            picture: &actor.picture,
            data: &actor.data,
            color: actor.color.map(|c| c.to_hex()),
            picture_object: actor.picture_object.as_ref(),
        };
        let created: CreatedObject = self
            .post(&format!("/actors/actor/{}/", actor.form_id), &body)
            .await?
            .ok_or_else(|| anyhow!("Actor creation returned no id"))?;
        Ok(created.id)
    }

    async fn create_layer_actor(&self, title: &str, form_id: i64) -> Result<String> {
        let body = LayerActorRequest {
            title,
            data: LayerActorData { kind: "graph" },
        };
        let created: CreatedObject = self
            .post(&format!("/actors/actor/{}", form_id), &body)
            .await?
            .ok_or_else(|| anyhow!("Layer creation returned no id"))?;
        Ok(created.id)
    }

    async fn create_link(
        &self,
        link_type: i64,
        workspace_id: &str,
        source: &str,
        target: &str,
    ) -> Result<String> {
        let body = LinkRequest {
            source,
            target,
            edge_type_id: link_type,
            curve_style: "curved",
        };
        let created: CreatedObject = self
            .post(&format!("/actors/link/{}", workspace_id), &body)
            .await?
            .ok_or_else(|| anyhow!("Link creation returned no id"))?;
        Ok(created.id)
    }

    async fn add_actor_to_layer(
        &self,
        layer_id: &str,
        actor_id: &str,
        position: Position,
    ) -> Result<i64> {
        let body = [Action::create(LayerNode {
            id: actor_id,
            kind: LayerItemKind::Node,
            position,
        })];
        let placed: LayerPlacementResult = self
            .post(&format!("/graph_layers/actors/{}", layer_id), &body)
            .await?
            .ok_or_else(|| anyhow!("Layer placement returned no data"))?;
        placed
            .nodes_map
            .first()
            .map(|n| n.la_id)
            .ok_or_else(|| anyhow!("Layer placement of {} returned no node", actor_id))
    }

    async fn add_edge_to_layer(
        &self,
        layer_id: &str,
        link_id: &str,
        source_placement: i64,
        target_placement: i64,
    ) -> Result<()> {
        let body = [Action::create(LayerEdgeRequest {
            id: link_id,
            kind: LayerItemKind::Edge,
            la_id_source: source_placement,
            la_id_target: target_placement,
        })];
        self.post::<_, Value>(&format!("/graph_layers/actors/{}", layer_id), &body)
            .await?;
        Ok(())
    }

    async fn create_comment(&self, record_id: &str, text: &str) -> Result<()> {
        let body = CommentRequest {
            description: text,
            data: CommentData { rating: 0 },
        };
        self.post::<_, Value>(&format!("/reactions/comment/{}", record_id), &body)
            .await?;
        Ok(())
    }
}

fn generated_reference() -> String {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros())
        .to_string()
}
