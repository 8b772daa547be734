use crate::db::migrations;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub struct Db {
    pub conn: Connection,
}

impl Db {
    /// Opens the database at the configured path and brings the schema up
    /// to date.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Db> {
        let mut conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite database at {}", path.as_ref().display()))?;

        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        // Run migrations
        migrations::init_with_migrations(&mut conn)?;

        Ok(Db { conn })
    }
}
