mod config;
mod openai_adapter;
mod prompt_loader;
mod room;

use crate::config::Config;
use crate::room::RoomState;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use clap::{Parser, Subcommand};
use interview_core::agent::Persona;
use interview_core::orchestrator::{AGENT_NAME, WorkerContext};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Voice agent that prepares mock job interviews")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker and accept participant connections
    Start,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    match cli.command {
        Command::Start => start(config).await,
    }
}

async fn start(config: Config) -> Result<()> {
    let persona = match &config.prompts_dir {
        Some(dir) => prompt_loader::load_persona(dir).context("Failed to load agent prompts")?,
        None => Persona::default(),
    };

    let worker = Arc::new(WorkerContext::prewarm(config.pipeline.clone())?);
    let state = Arc::new(RoomState {
        worker,
        persona,
        api_key: config.openai_api_key.clone(),
        interview_api_url: config.interview_api_url.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let route = format!("/agents/{}", AGENT_NAME);
    let app = Router::new()
        .route(&route, get(room::agent_handler))
        .with_state(state)
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!("Worker for {} listening on {}{}", AGENT_NAME, config.bind_address, route);

    axum::serve(listener, app).await?;

    Ok(())
}
