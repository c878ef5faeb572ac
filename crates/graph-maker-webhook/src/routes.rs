use crate::ServerConfig;
use crate::error::{ApiError, panic_response};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use graph_maker_core::{RESPONSE_KEY, Request, form_schema};
use graph_maker_engine::{GraphMaker, RunError};
use graph_maker_llm::LlmClient;
use graph_maker_platform::PlatformClient;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for the handlers.
pub type AppState = Arc<ServerConfig>;

type Payload = Map<String, Value>;

pub fn router(config: ServerConfig) -> Router {
    with_layers(
        Router::new()
            .route("/health", get(health_handler))
            .route("/graph_maker", post(graph_maker_handler))
            .route("/structured_output", post(structured_output_handler)),
    )
    .with_state(Arc::new(config))
}

/// Panics become 500 responses inside the traced span.
fn with_layers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Build a graph from the payload's text and echo the payload back with
/// the decoded graph under `graph_maker_rsp`.
async fn graph_maker_handler(
    State(config): State<AppState>,
    payload: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<Payload>, ApiError> {
    let Json(mut payload) = payload?;
    let request = Request::from_payload(&payload).map_err(RunError::from)?;
    info!("Graph maker request: {:?}", request);

    let platform = PlatformClient::new(config.platform_config(&request.sim_api_key))
        .map_err(ApiError::Internal)?;
    let completion =
        LlmClient::new(config.llm_config(&request.open_api_key)).map_err(ApiError::Internal)?;

    let maker = GraphMaker::new(platform, completion, config.maker_config());
    let graph = maker.run(&request).await?;

    let rsp = serde_json::to_value(&graph).map_err(|e| ApiError::Internal(e.into()))?;
    payload.insert(RESPONSE_KEY.to_string(), rsp);
    Ok(Json(payload))
}

/// Turn a platform form definition into a strict JSON schema.
async fn structured_output_handler(
    payload: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<Payload>, ApiError> {
    let Json(mut payload) = payload?;
    let form = form_schema::form_from_payload(&payload)?;
    let schema = form_schema::structured_output_schema(&form)?;
    info!(
        "Built structured output schema for form '{}' ({} sections)",
        form.title,
        form.sections.len()
    );

    payload.insert(
        form_schema::RESPONSE_KEY.to_string(),
        json!({ "schema": schema, "status": "ok" }),
    );
    Ok(Json(payload))
}
