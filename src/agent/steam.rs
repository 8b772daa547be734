//! Steam game detection.
//!
//! Steam appends app lifecycle transitions to `content_log.txt`. Scanning
//! the log from the start and tracking which app most recently entered
//! the `App Running` state (and has not left it) identifies the running
//! game. The log is bounded and polls run at human timescales, so a full
//! scan per probe is fine; no file position is cached.

use crate::libs::data_storage::DataStorage;
use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

static STEAM_EVENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"AppID (\d+) state changed : (.*),$").unwrap());

const NAME_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);
const APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails/?filters=basic&appids=";

/// A running Steam game.
#[derive(Debug, Clone)]
pub struct SteamGame {
    pub app_id: String,
    pub name: String,
}

/// Detects the currently running Steam game.
pub struct SteamProbe {
    name_cache: RwLock<HashMap<String, String>>,
    client: reqwest::Client,
}

impl SteamProbe {
    pub fn new() -> Self {
        SteamProbe {
            name_cache: RwLock::new(HashMap::new()),
            client: reqwest::Client::new(),
        }
    }

    /// Returns the running game, if any. A missing log file means Steam
    /// is not installed and is not an error.
    pub async fn detect(&self) -> Result<Option<SteamGame>> {
        let log_path = content_log_path();
        let file = match File::open(&log_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("open steam log {}", log_path.display())),
        };

        let app_id = match running_app_from_log(BufReader::new(file))? {
            Some(app_id) => app_id,
            None => return Ok(None),
        };

        let name = match self.lookup_game_name(&app_id).await {
            Ok(name) => name,
            // Name lookup is best effort; the id still identifies the game.
            Err(e) => {
                tracing::debug!(app_id = %app_id, error = %e, "steam name lookup failed");
                format!("Steam Game {app_id}")
            }
        };

        Ok(Some(SteamGame { app_id, name }))
    }

    async fn lookup_game_name(&self, app_id: &str) -> Result<String> {
        if let Some(name) = self.name_cache.read().get(app_id) {
            return Ok(name.clone());
        }

        let url = format!("{APP_DETAILS_URL}{app_id}");
        let response = self
            .client
            .get(&url)
            .timeout(NAME_LOOKUP_TIMEOUT)
            .send()
            .await
            .context("query steam app details")?;

        let details: HashMap<String, AppDetails> = response.json().await.context("parse steam app details")?;
        let name = details
            .get(app_id)
            .filter(|d| d.success)
            .and_then(|d| d.data.as_ref())
            .map(|d| d.name.clone())
            .ok_or_else(|| anyhow!("no data for app id {app_id}"))?;

        self.name_cache.write().insert(app_id.to_string(), name.clone());
        Ok(name)
    }
}

impl Default for SteamProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct AppDetails {
    #[serde(default)]
    success: bool,
    data: Option<AppData>,
}

#[derive(Debug, Deserialize)]
struct AppData {
    name: String,
}

pub fn content_log_path() -> PathBuf {
    Path::new(&DataStorage::home_dir())
        .join(".local")
        .join("share")
        .join("Steam")
        .join("logs")
        .join("content_log.txt")
}

/// Scans the content log and returns the app id still in the
/// `App Running` state at EOF, assuming at most one game runs at a time.
pub fn running_app_from_log<R: BufRead>(reader: R) -> Result<Option<String>> {
    let mut current: Option<String> = None;

    for line in reader.lines() {
        let line = line.context("read steam log")?;
        let Some(caps) = STEAM_EVENT_RE.captures(&line) else {
            continue;
        };

        let app_id = &caps[1];
        let running = caps[2].split(',').any(|event| event.trim() == "App Running");

        if running {
            current = Some(app_id.to_string());
        } else if current.as_deref() == Some(app_id) {
            // This app left the running state.
            current = None;
        }
    }

    Ok(current)
}
