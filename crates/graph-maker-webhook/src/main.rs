use anyhow::{Context, Result};
use clap::Parser;
use graph_maker_engine::ChunkPolicy;
use graph_maker_webhook::{ServerConfig, router};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "graph-maker", about = "Webhook that turns text into platform graphs")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "GRAPH_MAKER_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Platform REST API base URL
    #[arg(long, env = "GRAPH_MAKER_PLATFORM_URL")]
    platform_url: Option<String>,

    /// Chat completion API base URL
    #[arg(long, env = "GRAPH_MAKER_LLM_URL")]
    llm_url: Option<String>,

    /// Completion model; must support json_schema response formats
    #[arg(long, env = "GRAPH_MAKER_MODEL")]
    model: Option<String>,

    /// Base URL of the links posted in confirmation comments
    #[arg(long, env = "GRAPH_MAKER_DEEP_LINK_BASE")]
    deep_link_base: Option<String>,

    /// first-chunk or all-chunks
    #[arg(long, env = "GRAPH_MAKER_CHUNK_POLICY", default_value_t = ChunkPolicy::FirstChunk)]
    chunk_policy: ChunkPolicy,

    /// Completion request timeout in seconds
    #[arg(long, env = "GRAPH_MAKER_COMPLETION_TIMEOUT", default_value_t = 120)]
    completion_timeout: u64,

    /// Platform request timeout in seconds
    #[arg(long, env = "GRAPH_MAKER_PLATFORM_TIMEOUT", default_value_t = 30)]
    platform_timeout: u64,

    /// Directory for the rotated JSON log files
    #[arg(long, env = "GRAPH_MAKER_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            platform_base_url: self
                .platform_url
                .clone()
                .unwrap_or(defaults.platform_base_url),
            llm_base_url: self.llm_url.clone().unwrap_or(defaults.llm_base_url),
            model: self.model.clone().unwrap_or(defaults.model),
            deep_link_base: self
                .deep_link_base
                .clone()
                .unwrap_or(defaults.deep_link_base),
            chunk_policy: self.chunk_policy,
            completion_timeout: Duration::from_secs(self.completion_timeout),
            platform_timeout: Duration::from_secs(self.platform_timeout),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.log_dir)
        .with_context(|| format!("Failed to create log directory {}", cli.log_dir.display()))?;
    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("graph-maker")
        .filename_suffix("log")
        .build(&cli.log_dir)
        .context("Failed to create log file appender")?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_filter = EnvFilter::new("trace");

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(console_filter))
        .with(
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(file_filter),
        )
        .init();

    let config = cli.server_config();
    info!(
        "Platform API {}, completion API {} ({}), chunk policy {}",
        config.platform_base_url, config.llm_base_url, config.model, config.chunk_policy
    );

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("Graph maker listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(config))
        .await
        .context("HTTP server failed")?;
    Ok(())
}
