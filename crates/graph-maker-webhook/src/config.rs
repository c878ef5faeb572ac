use graph_maker_engine::{ChunkPolicy, DEFAULT_DEEP_LINK_BASE, GraphMakerConfig};
use graph_maker_llm::LlmConfig;
use graph_maker_platform::PlatformConfig;
use std::time::Duration;

/// Server-wide settings. Credentials arrive per request and are never stored here.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub platform_base_url: String,
    pub llm_base_url: String,
    pub model: String,
    pub deep_link_base: String,
    pub chunk_policy: ChunkPolicy,
    pub completion_timeout: Duration,
    pub platform_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let platform = PlatformConfig::default();
        let llm = LlmConfig::default();
        Self {
            platform_base_url: platform.base_url,
            llm_base_url: llm.base_url,
            model: llm.model,
            deep_link_base: DEFAULT_DEEP_LINK_BASE.to_string(),
            chunk_policy: ChunkPolicy::default(),
            completion_timeout: Duration::from_secs(120),
            platform_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn platform_config(&self, token: &str) -> PlatformConfig {
        PlatformConfig {
            base_url: self.platform_base_url.clone(),
            timeout: Some(self.platform_timeout),
            ..Default::default()
        }
        .with_token(token)
    }

    pub fn llm_config(&self, api_key: &str) -> LlmConfig {
        LlmConfig {
            base_url: self.llm_base_url.clone(),
            model: self.model.clone(),
            timeout: Some(self.completion_timeout),
            ..Default::default()
        }
        .with_api_key(api_key)
    }

    pub fn maker_config(&self) -> GraphMakerConfig {
        GraphMakerConfig {
            chunk_policy: self.chunk_policy,
            deep_link_base: self.deep_link_base.clone(),
        }
    }
}
