use anyhow::{Context, Result};
use clap::Parser;
use runner_agent::AgentRegistry;
use runner_core::{init_tracing, Config, LogStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::controller::UiController;
use crate::server::{serve, AppState};

#[derive(Parser)]
#[clap(author, version, about)]
pub struct Cli {
    /// Path to config file
    #[clap(long, short)]
    config: Option<PathBuf>,

    /// Interface to listen on
    #[clap(long)]
    host: Option<String>,

    /// Port to listen on
    #[clap(long, short)]
    port: Option<u16>,

    /// JSON lines log file shown in the UI
    #[clap(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Directory for diagnostic logs (stderr when unset)
    #[clap(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Registered agent adapter to use
    #[clap(long)]
    agent: Option<String>,

    /// Enable verbose logging
    #[clap(long)]
    verbose: bool,
}

impl Cli {
    /// Command line values win over the config file
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.log_file {
            config.log_store.path = path.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.logging.log_dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(agent) = &self.agent {
            config.agent.adapter = agent.clone();
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}

/// Build the shared application state from configuration
pub fn build_state(config: &Config, registry: &AgentRegistry) -> Result<AppState> {
    let log_store = LogStore::open(config.log_store.clone())
        .with_context(|| format!("Failed to open log store at {}", config.log_store.path.display()))?;

    let capability = registry.resolve(&config.agent.adapter);
    let controller = UiController::new(capability, Arc::new(log_store))
        .with_tail_lines(config.ui.tail_lines);
    controller.announce();

    Ok(AppState::new(controller)
        .with_title(&config.ui.title)
        .with_auto_refresh_secs(config.ui.auto_refresh_secs)
        .with_session_idle(Duration::from_secs(config.ui.session_idle_secs)))
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(cli.config.as_deref()).context("Could not load configuration")?;
    let mut config = loaded.config.clone();
    cli.apply(&mut config);

    let log_dir = config.logging.log_dir.as_deref().map(Path::new);
    let tracing_guard = init_tracing(log_dir, &config.logging.level);
    if let Some(file) = tracing_guard.log_file() {
        println!("Diagnostic log: {}", file.display());
    }
    loaded.report();
    debug!("Configuration: {:?}", config);

    let registry = AgentRegistry::with_builtin();
    let state = Arc::new(build_state(&config, &registry)?);
    if !state.controller.capability().is_available() {
        warn!("Starting without an agent; every submission will return a diagnostic");
    }

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    println!("Agent runner on http://{}", address);
    println!("Interaction log: {}", config.log_store.path.display());

    serve(listener, state, shutdown_signal()).await?;

    info!("Agent runner stopped");
    drop(tracing_guard);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
