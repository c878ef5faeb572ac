mod chunk;
mod client;
mod structured;
mod types;

pub use chunk::split_into_chunks;
pub use client::{LlmClient, LlmConfig};
pub use structured::{StructuredSchema, complete_structured};
pub use types::*;

use anyhow::Result;
use std::future::Future;

/// A chat completion endpoint that honours JSON schema response formats.
///
/// `LlmClient` is the production implementation; tests substitute canned
/// backends.
pub trait CompletionBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send `system` and `user` as one conversation and return the first
    /// choice's text content, constrained by `schema`.
    fn complete(
        &self,
        system: &str,
        user: &str,
        schema: &StructuredSchema,
    ) -> impl Future<Output = Result<String>> + Send;
}
