use crate::types::*;
use crate::{CompletionBackend, StructuredSchema};
use anyhow::{Context, Result, anyhow};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            // Structured outputs need a model that supports json_schema response formats.
            model: "gpt-4o-2024-08-06".to_string(),
            temperature: None,
            max_tokens: None,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl LlmConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|k| !k.is_empty());
        self
    }
}

pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build LLM HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub async fn chat(
        &self,
        messages: Vec<Message>,
        response_format: Option<ResponseFormat>,
    ) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            response_format,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("LLM request to {}: {} messages", url, request.messages.len());

        let mut req_builder = self.http.post(&url).json(&request);

        if let Some(api_key) = &self.config.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder
            .send()
            .await
            .context("Failed to send request to LLM")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM request failed ({}): {}", status, error_text);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        info!(
            "LLM response: finish_reason={:?}, total_tokens={:?}",
            chat_response
                .choices
                .first()
                .and_then(|c| c.finish_reason.as_ref()),
            chat_response.usage.as_ref().map(|u| u.total_tokens)
        );

        Ok(chat_response)
    }
}

impl CompletionBackend for LlmClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        schema: &StructuredSchema,
    ) -> Result<String> {
        let messages = vec![Message::system(system), Message::user(user)];
        let response = self
            .chat(messages, Some(schema.response_format()))
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("LLM returned no choices"))?;

        if let Some(refusal) = choice.message.refusal.as_deref() {
            anyhow::bail!("LLM refused the request: {}", refusal);
        }

        choice
            .message
            .text_content()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("LLM returned no text content"))
    }
}
