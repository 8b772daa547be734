//! Aggregator configuration.
//!
//! The aggregator is configured from a single JSON file: where the SQLite
//! database lives, where the query surface listens, how the "day" window
//! is anchored, and the set of devices to poll. Parsing is strict about
//! the invariants the poll runner depends on (a positive poll interval,
//! non-empty device identity) and fails startup on any violation.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_HTTP_LISTEN: &str = ":8080";
pub const DEFAULT_DAY_START_HOUR: u8 = 7;

/// One device agent to poll.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeviceConfig {
    pub id: String,
    pub base_url: String,
    pub poll_interval_seconds: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Aggregator settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub database_path: String,
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u8,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_http_listen() -> String {
    DEFAULT_HTTP_LISTEN.to_string()
}

fn default_day_start_hour() -> u8 {
    DEFAULT_DAY_START_HOUR
}

impl Config {
    /// Loads and validates the configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let data = fs::read_to_string(path.as_ref()).with_context(|| format!("read config {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&data).context("parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database_path.is_empty() {
            bail!("database_path is required");
        }
        if self.day_start_hour > 23 {
            bail!("day_start_hour must be in [0, 23]");
        }
        if self.devices.is_empty() {
            bail!("at least one device is required");
        }
        for (i, device) in self.devices.iter().enumerate() {
            if device.id.is_empty() {
                bail!("devices[{i}].id is required");
            }
            if device.base_url.is_empty() {
                bail!("devices[{i}].base_url is required");
            }
            if device.poll_interval_seconds == 0 {
                bail!("devices[{i}].poll_interval_seconds must be > 0");
            }
        }
        Ok(())
    }

    /// Resolves the configured IANA timezone, or the system local zone
    /// when none is set.
    pub fn resolve_timezone(&self) -> Result<AppTimezone> {
        match &self.timezone {
            None => Ok(AppTimezone::Local),
            Some(name) => {
                let tz: Tz = name.parse().map_err(|_| anyhow::anyhow!("unknown timezone {name:?}"))?;
                Ok(AppTimezone::Named(tz))
            }
        }
    }
}

/// The timezone the "day" window is anchored in.
#[derive(Debug, Clone, Copy)]
pub enum AppTimezone {
    Local,
    Named(Tz),
}

impl AppTimezone {
    /// Computes `[day_start, now)` where `day_start` is the most recent
    /// instant of `day_start_hour` on the local wall clock not after
    /// `now`. Before today's day-start hour the window reaches back into
    /// yesterday.
    pub fn day_window(&self, day_start_hour: u8, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            AppTimezone::Local => day_window_in(&chrono::Local, day_start_hour, now),
            AppTimezone::Named(tz) => day_window_in(tz, day_start_hour, now),
        }
    }
}

fn day_window_in<T: TimeZone>(tz: &T, day_start_hour: u8, now_utc: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let now_local = now_utc.with_timezone(tz);
    let today = now_local.date_naive();
    let mut day_start = local_at_hour(tz, today, day_start_hour);
    if now_local < day_start {
        day_start = local_at_hour(tz, today - Duration::days(1), day_start_hour);
    }
    (day_start.with_timezone(&Utc), now_utc)
}

fn local_at_hour<T: TimeZone>(tz: &T, date: NaiveDate, hour: u8) -> DateTime<T> {
    let naive = date.and_hms_opt(u32::from(hour), 0, 0).unwrap();
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // DST gap: the nominal hour does not exist on this date.
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(t) => t,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => tz.from_utc_datetime(&naive),
        },
    }
}
