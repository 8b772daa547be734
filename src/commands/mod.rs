//! Command-line interface commands for the screentime application.
//!
//! ## Commands
//! - [`serve`] - Run the aggregator: poll devices and serve usage queries
//! - [`agent`] - Run the local activity agent on a Linux workstation

pub mod agent;
pub mod serve;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Defines the main subcommands that the application can execute.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the aggregator service
    ///
    /// Polls every configured device agent, folds the samples into the
    /// session ledger, and serves the JSON query endpoints.
    #[command(about = "Poll devices and serve usage queries")]
    Serve(serve::ServeArgs),

    /// Run the local activity agent
    ///
    /// Detects the locally active application (Steam game, browser tab,
    /// or window title) and serves it over the device polling protocol.
    #[command(about = "Report local activity over the polling protocol")]
    Agent(agent::AgentArgs),
}

/// The main CLI structure that parses command-line arguments.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parses command-line arguments and executes the corresponding
    /// command.
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();

        match cli.command {
            Commands::Serve(args) => serve::cmd(args).await,
            Commands::Agent(args) => agent::cmd(args).await,
        }
    }
}
