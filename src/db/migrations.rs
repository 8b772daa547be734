//! Database schema migration management.
//!
//! Maintains a versioned registry of schema changes and applies pending
//! migrations during database initialization. Applied versions are recorded
//! in a `migrations` tracking table so the schema can evolve across
//! releases without manual intervention.

use anyhow::Result;
use rusqlite::{params, Connection, Transaction};

/// SQL schema for the migrations tracking table.
const MIGRATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS migrations (
    id INTEGER PRIMARY KEY,
    version INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// A single schema migration: version, descriptive name, and the
/// transformation applied within a transaction.
#[derive(Debug, Clone)]
struct Migration {
    version: u32,
    name: &'static str,
    up: fn(&Transaction) -> Result<()>,
}

/// Registry of all migrations, applied in version order.
pub struct MigrationManager {
    migrations: Vec<Migration>,
}

impl MigrationManager {
    pub fn new() -> Self {
        let mut manager = Self { migrations: Vec::new() };
        manager.register_migrations();
        manager
    }

    fn register_migrations(&mut self) {
        // Version 1: the session ledger.
        //
        // `sessions` is the append-only ledger of closed intervals;
        // `current_sessions` holds at most one open interval per device,
        // enforced by the primary key.
        self.add_migration(1, "create_session_tables", |tx| {
            tx.execute(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    device_id TEXT NOT NULL,
                    app_id TEXT NOT NULL,
                    app_name TEXT NOT NULL,
                    start_time TIMESTAMP NOT NULL,
                    end_time TIMESTAMP NOT NULL,
                    duration_seconds INTEGER NOT NULL,
                    end_reason TEXT NOT NULL
                )",
                [],
            )?;

            tx.execute(
                "CREATE TABLE IF NOT EXISTS current_sessions (
                    device_id TEXT PRIMARY KEY,
                    app_id TEXT NOT NULL,
                    app_name TEXT NOT NULL,
                    start_time TIMESTAMP NOT NULL,
                    last_seen_time TIMESTAMP NOT NULL,
                    state TEXT NOT NULL
                )",
                [],
            )?;

            // Indices for the two query axes: per-device history and
            // per-app aggregation, both windowed by start time.
            tx.execute("CREATE INDEX IF NOT EXISTS idx_sessions_device_time ON sessions(device_id, start_time)", [])?;
            tx.execute("CREATE INDEX IF NOT EXISTS idx_sessions_app_time ON sessions(app_name, start_time)", [])?;

            Ok(())
        });
    }

    fn add_migration(&mut self, version: u32, name: &'static str, up: fn(&Transaction) -> Result<()>) {
        self.migrations.push(Migration { version, name, up });
    }

    /// Applies all pending migrations inside a single transaction and
    /// records each one in the tracking table.
    pub fn run_migrations(&self, conn: &mut Connection) -> Result<()> {
        conn.execute(MIGRATIONS_TABLE, [])?;

        let current_version = self.get_current_version(conn)?;
        let pending: Vec<&Migration> = self.migrations.iter().filter(|m| m.version > current_version).collect();

        if pending.is_empty() {
            tracing::debug!("database schema is up to date");
            return Ok(());
        }

        let tx = conn.transaction()?;

        for migration in pending {
            tracing::info!(version = migration.version, name = migration.name, "applying migration");

            match (migration.up)(&tx) {
                Ok(()) => {
                    tx.execute("INSERT INTO migrations (version, name) VALUES (?1, ?2)", params![migration.version, migration.name])?;
                }
                Err(e) => {
                    tracing::error!(version = migration.version, error = %e, "migration failed");
                    return Err(e);
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_current_version(&self, conn: &Connection) -> Result<u32> {
        let version: Option<u32> = conn.query_row("SELECT MAX(version) FROM migrations", [], |row| row.get(0)).unwrap_or(Some(0));
        Ok(version.unwrap_or(0))
    }
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Initializes a database connection with the full migration set applied.
pub fn init_with_migrations(conn: &mut Connection) -> Result<()> {
    MigrationManager::new().run_migrations(conn)
}
