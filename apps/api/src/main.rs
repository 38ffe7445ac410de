mod agent;
mod config;
mod errors;
mod evaluation;
mod routes;
mod session;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agent::tools::ToolEndpoints;
use crate::agent::NebiusAgent;
use crate::config::Config;
use crate::evaluation::prompts::PromptStore;
use crate::routes::build_router;
use crate::session::SessionStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on unparseable env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_directive())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Candilyzer v{}", env!("CARGO_PKG_VERSION"));

    // Prompt store is required: a missing or malformed file aborts startup
    let prompts = PromptStore::load(&config.prompts_path)
        .with_context(|| format!("Cannot start without prompts from '{}'", config.prompts_path))?;
    info!("Prompts loaded from {}", config.prompts_path);

    // Initialize agent runtime
    let agent = NebiusAgent::new(
        config.nebius_base_url.clone(),
        ToolEndpoints {
            github_api_url: config.github_api_url.clone(),
            exa_api_url: config.exa_api_url.clone(),
        },
        config.agent_max_turns,
    )?;
    info!(
        "Agent runtime initialized (endpoint: {}, max turns: {})",
        config.nebius_base_url, config.agent_max_turns
    );

    // Build app state
    let state = AppState {
        prompts: Arc::new(prompts),
        agent: Arc::new(agent),
        sessions: SessionStore::new(config.session_defaults.clone()),
    };

    // Build router
    // The page is served from this origin, so no CORS layer
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
