//! Activity detection pipeline.
//!
//! Probes run in priority order: a running Steam game wins over the
//! focused browser tab, which wins over the bare window title. The order
//! is semantic, not cosmetic - a browser sitting behind a running game
//! must report the game.

use crate::agent::browser::BrowserProbe;
use crate::agent::categorizer::Categorizer;
use crate::agent::config::AgentConfig;
use crate::agent::steam::SteamProbe;
use crate::agent::window::WindowProbe;
use crate::db::sessions::DeviceState;
use anyhow::{Context, Result};

/// The current activity on this machine.
#[derive(Debug, Clone)]
pub struct Activity {
    /// Opaque app id, e.g. "steam:12345", "browser:homework", "window:code".
    pub id: String,
    /// Human-readable name.
    pub name: String,
    pub state: DeviceState,
}

pub struct Detector {
    config: AgentConfig,
    steam: SteamProbe,
    window: WindowProbe,
    browser: BrowserProbe,
    categorizer: Categorizer,
}

impl Detector {
    pub async fn new(config: AgentConfig) -> Result<Self> {
        let window = WindowProbe::connect().await.context("create window probe")?;

        Ok(Detector {
            steam: SteamProbe::new(),
            browser: BrowserProbe::new(&config.firefox_profile),
            categorizer: Categorizer::new(config.categories.clone()),
            window,
            config,
        })
    }

    /// Returns the current activity. Probe failures are logged and
    /// degrade the answer instead of failing the poll.
    pub async fn detect(&self) -> Activity {
        // Priority 1: a running Steam game.
        match self.steam.detect().await {
            Ok(Some(game)) => {
                return Activity {
                    id: format!("steam:{}", game.app_id),
                    name: game.name,
                    state: DeviceState::Active,
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "steam detection error"),
        }

        let window = match self.window.active_window().await {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(error = %e, "window detection error");
                return Activity {
                    id: "unknown".to_string(),
                    name: "Unknown".to_string(),
                    state: DeviceState::Offline,
                };
            }
        };

        let Some(window) = window else {
            return Activity {
                id: "idle:no-window".to_string(),
                name: "No Window".to_string(),
                state: DeviceState::Idle,
            };
        };

        if window.is_idle(&self.config.idle_window_patterns) {
            return Activity {
                id: "idle:screensaver".to_string(),
                name: window.title,
                state: DeviceState::Idle,
            };
        }

        if window.is_ignored(&self.config.ignored_windows) {
            return Activity {
                id: "idle:ignored".to_string(),
                name: window.title,
                state: DeviceState::Idle,
            };
        }

        // Priority 2: the active tab when a browser is focused.
        if window.is_browser() {
            match self.browser.detect_firefox() {
                Ok(tab) if !tab.domain.is_empty() => {
                    let category = self.categorizer.categorize(&tab.domain);
                    return Activity {
                        id: format!("browser:{category}"),
                        name: tab.domain,
                        state: DeviceState::Active,
                    };
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "firefox detection error"),
            }
            // No tab info; fall through to the window title.
        }

        // Priority 3: the window title.
        Activity {
            id: format!("window:{}", window.instance),
            name: window.title,
            state: DeviceState::Active,
        }
    }
}
