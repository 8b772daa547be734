//! Firefox active-tab detection.
//!
//! Firefox keeps a mozLz4-compressed snapshot of its session under
//! `sessionstore-backups/recovery.jsonlz4`; the selected window's
//! selected tab's last history entry is the page currently shown.

use crate::libs::data_storage::DataStorage;
use crate::libs::mozlz4;
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The active browser tab.
#[derive(Debug, Clone)]
pub struct BrowserTab {
    pub url: String,
    pub title: String,
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct FirefoxSession {
    #[serde(default)]
    pub windows: Vec<FirefoxWindow>,
    /// 1-indexed.
    #[serde(rename = "selectedWindow", default)]
    pub selected_window: i64,
}

#[derive(Debug, Deserialize)]
pub struct FirefoxWindow {
    /// 1-indexed.
    #[serde(default)]
    pub selected: i64,
    #[serde(default)]
    pub tabs: Vec<FirefoxTab>,
}

#[derive(Debug, Deserialize)]
pub struct FirefoxTab {
    #[serde(default)]
    pub entries: Vec<FirefoxEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirefoxEntry {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Reads the active tab out of Firefox's session store.
pub struct BrowserProbe {
    firefox_recovery_path: String,
}

impl BrowserProbe {
    /// `firefox_profile` overrides the recovery-file path; empty means
    /// auto-discover the default profile.
    pub fn new(firefox_profile: &str) -> Self {
        BrowserProbe {
            firefox_recovery_path: firefox_profile.to_string(),
        }
    }

    pub fn detect_firefox(&self) -> Result<BrowserTab> {
        let recovery_path = if self.firefox_recovery_path.is_empty() {
            default_firefox_recovery_path()?
        } else {
            PathBuf::from(&self.firefox_recovery_path)
        };

        let raw = fs::read(&recovery_path).with_context(|| format!("read recovery file {}", recovery_path.display()))?;
        let data = mozlz4::decompress(&raw)?;
        let session: FirefoxSession = serde_json::from_slice(&data).context("parse firefox session")?;

        let entry = select_active_entry(&session).ok_or_else(|| anyhow!("no active tab entry in session"))?;
        let domain = extract_domain(&entry.url);

        Ok(BrowserTab {
            url: entry.url.clone(),
            title: entry.title.clone(),
            domain,
        })
    }
}

/// Walks the session to the current history entry of the selected tab in
/// the selected window. Out-of-range selections fall back to the first
/// window or tab.
pub fn select_active_entry(session: &FirefoxSession) -> Option<&FirefoxEntry> {
    if session.windows.is_empty() {
        return None;
    }
    let mut window_idx = session.selected_window - 1;
    if window_idx < 0 || window_idx as usize >= session.windows.len() {
        window_idx = 0;
    }
    let window = &session.windows[window_idx as usize];

    if window.tabs.is_empty() {
        return None;
    }
    let mut tab_idx = window.selected - 1;
    if tab_idx < 0 || tab_idx as usize >= window.tabs.len() {
        tab_idx = 0;
    }

    window.tabs[tab_idx as usize].entries.last()
}

/// Hostname of a URL, minus a leading `www.`.
pub fn extract_domain(raw_url: &str) -> String {
    match url::Url::parse(raw_url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
            None => String::new(),
        },
        Err(_) => String::new(),
    }
}

/// Finds `recovery.jsonlz4` under the default Firefox profile.
pub fn default_firefox_recovery_path() -> Result<PathBuf> {
    let moz_dir = Path::new(&DataStorage::home_dir()).join(".mozilla").join("firefox");
    let entries = fs::read_dir(&moz_dir).with_context(|| format!("read firefox directory {}", moz_dir.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".default") || name.ends_with(".default-release") {
            let recovery = path.join("sessionstore-backups").join("recovery.jsonlz4");
            if recovery.exists() {
                return Ok(recovery);
            }
        }
    }

    bail!("no firefox profile with a recovery file found")
}
