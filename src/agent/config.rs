//! Agent configuration.
//!
//! Loaded from `$HOME/.config/screentime/agent.json`; a missing file
//! falls back to the built-in defaults so the agent is useful without any
//! setup.

use crate::libs::data_storage::DataStorage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const AGENT_CONFIG_FILE_NAME: &str = "agent.json";

pub const DEFAULT_AGENT_LISTEN: &str = ":8060";

/// Domain matching rules for one category.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_suffixes: Vec<String>,
}

/// Agent settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AgentConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub categories: HashMap<String, Category>,
    #[serde(default)]
    pub idle_window_patterns: Vec<String>,
    #[serde(default)]
    pub ignored_windows: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub firefox_profile: String,
}

fn default_listen() -> String {
    DEFAULT_AGENT_LISTEN.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        let mut categories = HashMap::new();
        categories.insert(
            "homework".to_string(),
            Category {
                domains: vec!["docs.google.com".into(), "classroom.google.com".into(), "khanacademy.org".into()],
                domain_suffixes: vec![".edu".into()],
            },
        );
        categories.insert(
            "entertainment".to_string(),
            Category {
                domains: vec!["youtube.com".into(), "netflix.com".into(), "twitch.tv".into(), "reddit.com".into()],
                domain_suffixes: Vec::new(),
            },
        );

        AgentConfig {
            listen: DEFAULT_AGENT_LISTEN.to_string(),
            hostname: String::new(),
            categories,
            idle_window_patterns: vec!["screensaver".into(), "lock screen".into(), "xscreensaver".into()],
            ignored_windows: Vec::new(),
            firefox_profile: String::new(),
        }
    }
}

impl AgentConfig {
    /// Default config file location inside the application config
    /// directory.
    pub fn default_path() -> Result<PathBuf> {
        DataStorage::new().get_path(AGENT_CONFIG_FILE_NAME)
    }

    /// Loads the config, falling back to defaults when the file does not
    /// exist. Unknown files elsewhere are still errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AgentConfig> {
        let data = match fs::read_to_string(path.as_ref()) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AgentConfig::default()),
            Err(e) => return Err(e).with_context(|| format!("read agent config {}", path.as_ref().display())),
        };
        let config: AgentConfig = serde_json::from_str(&data).context("parse agent config")?;
        Ok(config)
    }
}
