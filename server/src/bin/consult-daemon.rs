use anyhow::{Context, Result};
use clap::Parser;
use consult_analysis::{AnalysisPipeline, PipelineSettings, Providers};
use consult_core::config::{get_default_config_file, APP_NAME};
use consult_core::{create_llm_client, create_search_client, ConsultConfig};
use consult_server::auth::{self, TokenIssuer};
use consult_server::http_server::{self, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "consult-daemon",
    about = "Business analysis assistant HTTP service",
    version
)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "CONSULT_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP server address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Generative model API key
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Generative model to use
    #[arg(short = 'o', long)]
    model: Option<String>,

    /// Web search API key
    #[arg(long)]
    search_api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CONSULT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Write the effective file configuration and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("Starting consult daemon");

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_file(APP_NAME).context("Failed to resolve config path")?,
    };
    let mut config = ConsultConfig::load_from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    info!("Loaded configuration from {}", config_path.display());

    if args.init_config {
        config
            .save_to_file(&config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        info!("Wrote configuration to {}", config_path.display());
        return Ok(());
    }

    // Secrets come from the environment and CLI, never from the written file
    config.apply_env_overrides();
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if let Some(api_key) = args.api_key {
        config.llm.api_key = Some(api_key);
    }
    if let Some(model) = args.model {
        config.llm.model_name = model;
    }
    if let Some(search_key) = args.search_api_key {
        config.search.api_key = Some(search_key);
    }

    let generator = create_llm_client(&config.llm).context("Failed to initialize LLM client")?;
    info!(
        provider = generator.provider_name(),
        model = %generator.model_name(),
        "Initialized LLM client"
    );

    let search = create_search_client(&config.search).context("Failed to initialize search client")?;
    match &search {
        Some(client) => info!(provider = client.provider_name(), "Initialized search client"),
        None => warn!("No search API key configured, reports will be generated without web results"),
    }

    let pipeline = AnalysisPipeline::new(
        Providers { generator, search },
        PipelineSettings::from(&config.analysis),
    );

    let secret = match config.auth.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("No JWT secret configured, issued tokens will not survive a restart");
            auth::random_secret()
        }
    };
    let tokens = TokenIssuer::new(&secret, config.auth.token_ttl_hours);

    let state = AppState::in_memory(
        pipeline,
        tokens,
        Duration::from_secs(config.analysis.turn_timeout_secs),
    );

    http_server::run_server(state, &config.server).await?;

    info!("Consult daemon shutting down");
    Ok(())
}
