use anyhow::Result;
use screentime::commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "screentime=info".into()))
        .init();

    Cli::menu().await
}
