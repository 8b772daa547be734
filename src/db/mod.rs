//! Database layer for the screentime aggregator.
//!
//! Provides the SQLite persistence layer for session accounting. The layer
//! is split into a thin connection module, a versioned migration system,
//! and the session store that owns every mutation of the two accounting
//! tables.

/// Core database connection and initialization module.
pub mod db;

/// Database schema migration system.
pub mod migrations;

/// Session accounting store: poll application, reconciliation, queries.
pub mod sessions;
