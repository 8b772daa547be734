use crate::db::db::Db;
use crate::db::sessions::SessionStore;
use crate::libs::clock::{Clock, SystemClock};
use crate::libs::config::Config;
use crate::libs::runner::PollRunner;
use crate::libs::server::{self, AppState};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,
}

// Runs the aggregator until a shutdown signal arrives or the query
// server fails.
pub async fn cmd(args: ServeArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let tz = config.resolve_timezone()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let db = Db::open(&config.database_path)?;
    let store = Arc::new(SessionStore::new(db));

    // A previous run may have died with sessions still open; settle them
    // before the first poll can land.
    let closed = store.close_stale_current_sessions(clock.now()).context("close stale current sessions")?;
    if closed > 0 {
        tracing::info!(count = closed, "closed stale sessions from previous run");
    }

    let token = CancellationToken::new();
    spawn_signal_listener(token.clone());

    let runner = PollRunner::new(config.devices.clone(), store.clone(), clock.clone());
    let handles = runner.spawn(token.clone());

    let state = AppState {
        store,
        clock,
        tz,
        day_start_hour: config.day_start_hour,
    };
    let result = server::serve(&config.http_listen, server::router(state), token.clone()).await;

    // Whether the server stopped gracefully or failed, wind down the
    // poll loops before reporting.
    token.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    result
}

/// Cancels `token` on SIGINT or SIGTERM.
pub(crate) fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    token.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("shutdown signal received");
        token.cancel();
    });
}
