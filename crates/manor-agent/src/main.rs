//! Manor Agent - feed collector and local status API.
//!
//! Run with: `cargo run -p manor-agent`

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use manor_agent::config::API_KEY_ENV;
use manor_agent::{AppState, Config, api};
use manor_backend::BackendClient;

/// Manor Agent - dashboard feed collector and local status API.
#[derive(Parser, Debug)]
#[command(name = "manor-agent")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Backend base URL (overrides config).
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Disable the background collector (API only mode).
    #[arg(long, global = true)]
    no_collector: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent in the foreground (default behavior).
    Run,

    /// Refresh every configured feed once, then exit.
    Once,

    /// Validate the configuration and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("manor_agent=info".parse()?)
                .add_directive("manor_poll=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(url) = args.backend_url {
        config.backend.url = url;
    }

    config.validate()?;

    match args.command {
        Some(Command::CheckConfig) => {
            println!("Configuration OK ({} feed(s))", config.feeds.len());
            Ok(())
        }
        Some(Command::Once) => run_once(config).await,
        Some(Command::Run) | None => run_agent(config, args.no_collector).await,
    }
}

fn build_backend(config: &Config) -> anyhow::Result<BackendClient> {
    let api_key = config.backend.resolved_api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "backend API key is required (set backend.api_key or {})",
            API_KEY_ENV
        )
    })?;
    Ok(BackendClient::new(&config.backend.url, &api_key)?)
}

/// Refresh every feed once and exit non-zero if any failed.
async fn run_once(config: Config) -> anyhow::Result<()> {
    let backend = build_backend(&config)?;
    let state = AppState::new(config, backend)?;

    let outcomes = state.collector.lock().await.refresh_once().await;
    let mut failed = 0usize;
    for (name, outcome) in &outcomes {
        match outcome {
            Ok(()) => info!("Refreshed feed {}", name),
            Err(e) => {
                failed += 1;
                error!("Feed {} failed: {}", name, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} feed(s) failed to refresh", failed, outcomes.len());
    }
    Ok(())
}

async fn run_agent(config: Config, no_collector: bool) -> anyhow::Result<()> {
    let backend = build_backend(&config)?;
    let bind = config.server.bind.clone();

    let state = AppState::new(config, backend)?;

    // Start the background collector
    if !no_collector {
        state.collector.lock().await.start();
    } else {
        info!("Background collector disabled");
    }

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Parse bind address
    let addr: SocketAddr = bind.parse()?;

    info!("Starting status API on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
