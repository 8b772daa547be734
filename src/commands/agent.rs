use crate::agent::config::AgentConfig;
use crate::agent::detector::Detector;
use crate::agent::server as agent_server;
use crate::commands::serve::spawn_signal_listener;
use crate::libs::server;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct AgentArgs {
    /// Path to the agent config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the listen address (e.g. :8060)
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Print the default config as JSON and exit
    #[arg(long)]
    pub print_config: bool,
}

// Runs the local activity agent until a shutdown signal arrives.
pub async fn cmd(args: AgentArgs) -> Result<()> {
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&AgentConfig::default())?);
        return Ok(());
    }

    let config_path = match args.config {
        Some(path) => path,
        None => AgentConfig::default_path()?,
    };
    let mut config = AgentConfig::load(&config_path)?;

    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let detector = Arc::new(Detector::new(config.clone()).await.context("create detector")?);

    let token = CancellationToken::new();
    spawn_signal_listener(token.clone());

    tracing::info!(listen = %config.listen, "starting activity agent");
    server::serve(&config.listen, agent_server::router(detector), token).await
}
