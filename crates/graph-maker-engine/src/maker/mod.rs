mod discovery;
mod notify;
mod provision;
mod replay;

#[cfg(test)]
mod tests;

pub use discovery::{
    GRAPH_FORM_TITLE, HIERARCHY_LINK_TYPE, LAYER_FORM_TITLE, NODE_FORM_TITLE, WorkspaceObjects,
};
pub use notify::{DEFAULT_DEEP_LINK_BASE, comment_text, deep_link};
pub use provision::{GraphTarget, LAYER_TITLE};
pub use replay::{GRID_SCALE, IdMap, Placement, node_reference};

use crate::error::RunError;
use graph_maker_core::{Graph, Request};
use graph_maker_llm::{CompletionBackend, StructuredSchema, complete_structured, split_into_chunks};
use graph_maker_platform::Platform;
use std::fmt;
use std::str::FromStr;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

pub const SCHEMA_NAME: &str = "structured_output";
pub const SCHEMA_DESCRIPTION: &str = "The structured output of the model";

/// Which chunks of an oversized text are sent to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Only the first chunk; the rest is logged and dropped.
    #[default]
    FirstChunk,
    /// Every chunk, replayed in order onto the same layer.
    AllChunks,
}

impl fmt::Display for ChunkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkPolicy::FirstChunk => f.write_str("first-chunk"),
            ChunkPolicy::AllChunks => f.write_str("all-chunks"),
        }
    }
}

impl FromStr for ChunkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-chunk" => Ok(ChunkPolicy::FirstChunk),
            "all-chunks" => Ok(ChunkPolicy::AllChunks),
            other => Err(format!(
                "unknown chunk policy '{}', expected first-chunk or all-chunks",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphMakerConfig {
    pub chunk_policy: ChunkPolicy,
    pub deep_link_base: String,
}

impl Default for GraphMakerConfig {
    fn default() -> Self {
        Self {
            chunk_policy: ChunkPolicy::default(),
            deep_link_base: DEFAULT_DEEP_LINK_BASE.to_string(),
        }
    }
}

/// Turns a validated [`Request`] into a graph on the platform.
///
/// Every call of a run is awaited before the next one is issued.
pub struct GraphMaker<P: Platform, C: CompletionBackend> {
    platform: P,
    completion: C,
    config: GraphMakerConfig,
    schema: StructuredSchema,
}

impl<P: Platform, C: CompletionBackend> GraphMaker<P, C> {
    pub fn new(platform: P, completion: C, config: GraphMakerConfig) -> Self {
        Self {
            platform,
            completion,
            config,
            schema: StructuredSchema::for_type::<Graph>(SCHEMA_NAME, SCHEMA_DESCRIPTION),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn schema(&self) -> &StructuredSchema {
        &self.schema
    }

    /// Run the whole pipeline and return the graph(s) the model produced.
    pub async fn run(&self, request: &Request) -> Result<Graph, RunError> {
        let span = info_span!(
            "graph_maker_run",
            run_id = %Uuid::new_v4(),
            workspace = %request.workspace_id,
            reference = %request.reference,
        );
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: &Request) -> Result<Graph, RunError> {
        info!(
            "Starting graph maker run for {} users with {} model",
            request.users.len(),
            self.completion.model_name()
        );

        let objects =
            discovery::discover(&self.platform, &request.workspace_id, &request.users).await?;

        let chunks = self.select_chunks(request);
        let target = provision::provision(
            &self.platform,
            &request.workspace_id,
            &request.reference,
            &objects,
            &request.users,
        )
        .await?;

        let mut result = Graph::default();
        for (index, chunk) in chunks.iter().enumerate() {
            let graph: Graph =
                complete_structured(&self.completion, &request.system_msg, chunk, &self.schema)
                    .await
                    .map_err(RunError::Completion)?;
            info!(
                "Chunk {} produced {} nodes and {} edges",
                index,
                graph.nodes.len(),
                graph.edges.len()
            );

            replay::replay(
                &self.platform,
                &request.workspace_id,
                &request.reference,
                &objects,
                &target.layer_id,
                &graph,
            )
            .await?;
            result.append(graph);
        }

        if let Some(record_id) = request.event_actor_id.as_deref() {
            let link = deep_link(&self.config.deep_link_base, &request.workspace_id, &target);
            notify::notify(&self.platform, record_id, &link).await;
        }

        Ok(result)
    }

    fn select_chunks<'a>(&self, request: &'a Request) -> Vec<&'a str> {
        let mut chunks = split_into_chunks(&request.user_msg, request.chunk_size);
        if self.config.chunk_policy == ChunkPolicy::FirstChunk && chunks.len() > 1 {
            let dropped: usize = chunks[1..].iter().map(|c| c.chars().count()).sum();
            warn!(
                "Text split into {} chunks; only the first is processed, {} characters dropped",
                chunks.len(),
                dropped
            );
            chunks.truncate(1);
        }
        chunks
    }
}
