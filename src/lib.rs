//! # Screentime - Screen-Time Accounting Service
//!
//! A service that polls device agents for the currently foregrounded
//! application and folds the samples into a durable ledger of usage
//! sessions, queryable over HTTP.
//!
//! ## Features
//!
//! - **Session Accounting**: Converts discrete polls into contiguous
//!   per-device, per-app sessions that survive restarts
//! - **Concurrent Polling**: One independent loop per configured device
//! - **Usage Queries**: Current status, session history, and per-day
//!   usage aggregation over arbitrary windows
//! - **Linux Agent**: Detects the locally active application (Steam game,
//!   browser tab, or window title) and re-exports it over the same
//!   polling protocol
//!
//! ## Usage
//!
//! ```rust,no_run
//! use screentime::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod agent;
pub mod commands;
pub mod db;
pub mod libs;
