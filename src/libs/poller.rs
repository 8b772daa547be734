//! Per-device HTTP poller.
//!
//! Polls a device agent's `/query/active-app` endpoint and normalizes the
//! answer into a [`PollResult`]. Reachability faults are not errors: an
//! unreachable device is a fact the accountant needs to know about
//! (`offline`), not a failure of the poll itself. Errors are reserved for
//! protocol corruption - an unreadable body or malformed XML on a 200
//! response.

use crate::db::sessions::{DeviceState, PollUpdate};
use crate::libs::clock::Clock;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Fixed per-poll timeout, independent of the poll interval.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(3);

/// App names the device surfaces when nothing is actually playing.
const IDLE_APP_NAMES: [&str; 4] = ["roku", "home", "screensaver", "roku home"];

/// One normalized sample from a device.
#[derive(Debug, Clone)]
pub struct PollResult {
    pub device_id: String,
    pub app_id: String,
    pub app_name: String,
    pub state: DeviceState,
    pub timestamp: DateTime<Utc>,
}

impl PollResult {
    pub fn into_update(self) -> PollUpdate {
        PollUpdate {
            device_id: self.device_id,
            app_id: self.app_id,
            app_name: self.app_name,
            state: self.state,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ActiveAppDoc {
    app: Option<AppElement>,
}

#[derive(Debug, Deserialize)]
struct AppElement {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "$text", default)]
    name: String,
}

/// Extracts `(app_id, app_name)` from an `<active-app>` document.
pub fn parse_active_app(body: &str) -> Result<(String, String)> {
    let doc: ActiveAppDoc = quick_xml::de::from_str(body).context("unmarshal active-app response")?;
    match doc.app {
        Some(app) => Ok((app.id.trim().to_string(), app.name.trim().to_string())),
        None => Ok((String::new(), String::new())),
    }
}

/// Classifies a reported app name: empty or idle-equivalent names (home
/// screen, screensaver) mean nothing is playing.
pub fn classify_app_name(name: &str) -> DeviceState {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return DeviceState::Idle;
    }
    if IDLE_APP_NAMES.contains(&trimmed.to_lowercase().as_str()) {
        DeviceState::Idle
    } else {
        DeviceState::Active
    }
}

/// Polls one device agent over HTTP.
pub struct DevicePoller {
    device_id: String,
    base_url: String,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl DevicePoller {
    pub fn new(device_id: &str, base_url: &str, clock: Arc<dyn Clock>) -> Self {
        DevicePoller {
            device_id: device_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            clock,
        }
    }

    /// Issues one poll, stamped with the current UTC time.
    ///
    /// Connection failures and non-2xx statuses come back as
    /// `state = offline` with no error; only corruption after a
    /// successful response is surfaced to the caller.
    pub async fn poll(&self) -> Result<PollResult> {
        let mut result = PollResult {
            device_id: self.device_id.clone(),
            app_id: String::new(),
            app_name: String::new(),
            state: DeviceState::Offline,
            timestamp: self.clock.now(),
        };

        let url = format!("{}/query/active-app", self.base_url);
        let response = match self.client.get(&url).timeout(POLL_TIMEOUT).send().await {
            Ok(response) => response,
            // Unreachable device, not an error.
            Err(_) => return Ok(result),
        };

        if !response.status().is_success() {
            return Ok(result);
        }

        let body = response.text().await.context("read active-app response")?;
        if body.trim().is_empty() {
            return Ok(result);
        }

        let (app_id, app_name) = parse_active_app(&body)?;
        result.state = classify_app_name(&app_name);
        result.app_id = app_id;
        result.app_name = app_name;

        Ok(result)
    }
}
