//! Session accounting store.
//!
//! The two tables split the accounting problem in half: `current_sessions`
//! holds at most one open interval per device (primary key on the device
//! id), while `sessions` is the append-only ledger of closed intervals.
//! Every mutation of either table goes through this store inside a single
//! transaction, so a poll either lands completely or not at all.
//!
//! Timestamps are stored as UTC `%Y-%m-%d %H:%M:%S` strings. The format
//! orders lexicographically, which the monotonic `last_seen_time` guard
//! relies on.

use crate::db::db::Db;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension, Transaction};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SELECT_CURRENT: &str = "SELECT device_id, app_id, app_name, start_time, last_seen_time, state
    FROM current_sessions WHERE device_id = ?1";
const SELECT_ALL_CURRENT: &str = "SELECT device_id, app_id, app_name, start_time, last_seen_time, state
    FROM current_sessions";
const INSERT_CURRENT: &str = "INSERT INTO current_sessions (device_id, app_id, app_name, start_time, last_seen_time, state)
    VALUES (?1, ?2, ?3, ?4, ?5, 'active')";
const TOUCH_CURRENT: &str = "UPDATE current_sessions SET last_seen_time = MAX(last_seen_time, ?1) WHERE device_id = ?2";
const DELETE_CURRENT: &str = "DELETE FROM current_sessions WHERE device_id = ?1";
const DELETE_ALL_CURRENT: &str = "DELETE FROM current_sessions";
const INSERT_SESSION: &str = "INSERT INTO sessions (device_id, app_id, app_name, start_time, end_time, duration_seconds, end_reason)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Device-level state reported by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Active,
    Idle,
    Offline,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Active => "active",
            DeviceState::Idle => "idle",
            DeviceState::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DeviceState::Active),
            "idle" => Some(DeviceState::Idle),
            "offline" => Some(DeviceState::Offline),
            _ => None,
        }
    }
}

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    AppChange,
    Idle,
    Offline,
    AgentRestart,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::AppChange => "app_change",
            EndReason::Idle => "idle",
            EndReason::Offline => "offline",
            EndReason::AgentRestart => "agent_restart",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "app_change" => Some(EndReason::AppChange),
            "idle" => Some(EndReason::Idle),
            "offline" => Some(EndReason::Offline),
            "agent_restart" => Some(EndReason::AgentRestart),
            _ => None,
        }
    }
}

/// Normalized poll sample for one device at one point in time.
#[derive(Debug, Clone)]
pub struct PollUpdate {
    pub device_id: String,
    pub app_id: String,
    pub app_name: String,
    pub state: DeviceState,
    pub timestamp: DateTime<Utc>,
}

/// The open interval for a device, at most one per device.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentSession {
    pub device_id: String,
    pub app_id: String,
    pub app_name: String,
    pub start_time: DateTime<Utc>,
    pub last_seen_time: DateTime<Utc>,
    pub state: DeviceState,
}

/// A closed, persisted interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: i64,
    pub device_id: String,
    pub app_id: String,
    pub app_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub end_reason: EndReason,
}

/// Aggregated seconds for one `(device, app)` pair inside a query window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageEntry {
    pub device_id: String,
    pub app_id: String,
    pub app_name: String,
    pub total_seconds: i64,
}

fn format_ts(t: DateTime<Utc>) -> String {
    t.format(DT_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    // Stored timestamps are always written by `format_ts`.
    NaiveDateTime::parse_from_str(s, DT_FORMAT).unwrap()
}

// Manages all state transitions of the session ledger.
pub struct SessionStore {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SessionStore {
    pub fn new(db: Db) -> Self {
        SessionStore {
            conn: Arc::new(Mutex::new(db.conn)),
        }
    }

    /// Folds one poll sample into the ledger.
    ///
    /// All effects commit in a single transaction. An `active` sample with
    /// an empty app id or name carries no usable information and leaves
    /// the ledger untouched.
    pub fn apply_poll(&self, p: &PollUpdate) -> Result<()> {
        if p.device_id.is_empty() {
            bail!("poll update missing device_id");
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let cur = tx
            .query_row(SELECT_CURRENT, params![p.device_id], map_current_row)
            .optional()
            .context("query current session")?;

        match p.state {
            DeviceState::Active => {
                if p.app_id.is_empty() || p.app_name.is_empty() {
                    return Ok(());
                }

                let ts = format_ts(p.timestamp);
                match cur {
                    None => {
                        tx.execute(INSERT_CURRENT, params![p.device_id, p.app_id, p.app_name, ts, ts])
                            .context("insert current session")?;
                    }
                    Some(cur) if cur.app_id != p.app_id => {
                        end_session_tx(&tx, &cur, p.timestamp, EndReason::AppChange)?;
                        tx.execute(INSERT_CURRENT, params![p.device_id, p.app_id, p.app_name, ts, ts])
                            .context("insert current session after app change")?;
                    }
                    Some(_) => {
                        // Same app: advance the heartbeat. MAX keeps
                        // last_seen_time monotonic against out-of-order
                        // samples.
                        tx.execute(TOUCH_CURRENT, params![ts, p.device_id]).context("update last_seen_time")?;
                    }
                }
            }
            DeviceState::Idle | DeviceState::Offline => {
                if let Some(cur) = cur {
                    let reason = match p.state {
                        DeviceState::Idle => EndReason::Idle,
                        _ => EndReason::Offline,
                    };
                    end_session_tx(&tx, &cur, p.timestamp, reason)?;
                }
            }
        }

        tx.commit().context("commit poll transaction")?;
        Ok(())
    }

    /// Closes every open session left behind by a previous run.
    ///
    /// The effective end is the last heartbeat, clamped into
    /// `[start_time, now]`: time between the last heartbeat and the crash
    /// is unknowable and deliberately discarded rather than back-filled.
    /// Returns the number of sessions closed.
    pub fn close_stale_current_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let stale: Vec<CurrentSession> = {
            let mut stmt = tx.prepare(SELECT_ALL_CURRENT)?;
            let rows = stmt.query_map([], map_current_row)?;
            rows.collect::<rusqlite::Result<_>>().context("scan current sessions")?
        };

        for cur in &stale {
            let mut end = cur.last_seen_time;
            if end > now {
                end = now;
            }
            if end < cur.start_time {
                end = cur.start_time;
            }
            let duration = (end - cur.start_time).num_seconds().max(0);
            tx.execute(
                INSERT_SESSION,
                params![
                    cur.device_id,
                    cur.app_id,
                    cur.app_name,
                    format_ts(cur.start_time),
                    format_ts(end),
                    duration,
                    EndReason::AgentRestart.as_str()
                ],
            )
            .context("insert session from stale current session")?;
        }

        tx.execute(DELETE_ALL_CURRENT, []).context("clear current sessions")?;
        tx.commit()?;

        Ok(stale.len())
    }

    /// Returns every open session row.
    pub fn current_sessions(&self) -> Result<Vec<CurrentSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_ALL_CURRENT)?;
        let rows = stmt.query_map([], map_current_row)?;
        let out = rows.collect::<rusqlite::Result<_>>().context("scan current sessions")?;
        Ok(out)
    }

    /// Returns closed sessions ordered by start time, optionally filtered
    /// by device and a `[since, until)` window on the start time.
    pub fn sessions(&self, device_id: Option<&str>, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<Vec<Session>> {
        let mut query = String::from(
            "SELECT id, device_id, app_id, app_name, start_time, end_time, duration_seconds, end_reason FROM sessions WHERE 1=1",
        );
        let mut args: Vec<String> = Vec::new();

        if let Some(device) = device_id {
            query.push_str(" AND device_id = ?");
            args.push(device.to_string());
        }
        if let Some(since) = since {
            query.push_str(" AND start_time >= ?");
            args.push(format_ts(since));
        }
        if let Some(until) = until {
            query.push_str(" AND start_time < ?");
            args.push(format_ts(until));
        }
        query.push_str(" ORDER BY start_time ASC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok(Session {
                id: row.get(0)?,
                device_id: row.get(1)?,
                app_id: row.get(2)?,
                app_name: row.get(3)?,
                start_time: parse_ts(&row.get::<_, String>(4)?).and_utc(),
                end_time: parse_ts(&row.get::<_, String>(5)?).and_utc(),
                duration_seconds: row.get(6)?,
                end_reason: EndReason::parse(&row.get::<_, String>(7)?).unwrap(),
            })
        })?;
        let out = rows.collect::<rusqlite::Result<_>>().context("scan sessions")?;
        Ok(out)
    }

    /// Aggregates usage per `(device, app)` over `[start, end)`.
    ///
    /// Closed sessions contribute their overlap with the window. Open
    /// sessions are credited only up to their last heartbeat, never
    /// forward of it: a device that went silent without reporting
    /// `offline` must not accrue time it may not have spent.
    pub fn usage_between(&self, start: DateTime<Utc>, end: DateTime<Utc>, device_id: Option<&str>) -> Result<Vec<UsageEntry>> {
        if start >= end {
            return Ok(Vec::new());
        }

        let mut agg: HashMap<(String, String, String), i64> = HashMap::new();

        let conn = self.conn.lock();

        // Closed sessions intersecting the window.
        let mut query = String::from("SELECT device_id, app_id, app_name, start_time, end_time FROM sessions WHERE end_time > ? AND start_time < ?");
        let mut args = vec![format_ts(start), format_ts(end)];
        if let Some(device) = device_id {
            query.push_str(" AND device_id = ?");
            args.push(device.to_string());
        }

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                parse_ts(&row.get::<_, String>(3)?).and_utc(),
                parse_ts(&row.get::<_, String>(4)?).and_utc(),
            ))
        })?;
        for row in rows {
            let (device, app_id, app_name, s_start, s_end) = row?;
            add_overlap(&mut agg, device, app_id, app_name, s_start, s_end, start, end);
        }

        // Open sessions, credited up to their last heartbeat.
        let mut query = String::from("SELECT device_id, app_id, app_name, start_time, last_seen_time FROM current_sessions");
        let mut args: Vec<String> = Vec::new();
        if let Some(device) = device_id {
            query.push_str(" WHERE device_id = ?");
            args.push(device.to_string());
        }

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                parse_ts(&row.get::<_, String>(3)?).and_utc(),
                parse_ts(&row.get::<_, String>(4)?).and_utc(),
            ))
        })?;
        for row in rows {
            let (device, app_id, app_name, s_start, last_seen) = row?;
            let s_end = last_seen.min(end);
            add_overlap(&mut agg, device, app_id, app_name, s_start, s_end, start, end);
        }

        let mut out: Vec<UsageEntry> = agg
            .into_iter()
            .map(|((device_id, app_id, app_name), total_seconds)| UsageEntry {
                device_id,
                app_id,
                app_name,
                total_seconds,
            })
            .collect();
        out.sort_by(|a, b| (&a.device_id, &a.app_id).cmp(&(&b.device_id, &b.app_id)));
        Ok(out)
    }
}

fn map_current_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CurrentSession> {
    Ok(CurrentSession {
        device_id: row.get(0)?,
        app_id: row.get(1)?,
        app_name: row.get(2)?,
        start_time: parse_ts(&row.get::<_, String>(3)?).and_utc(),
        last_seen_time: parse_ts(&row.get::<_, String>(4)?).and_utc(),
        state: DeviceState::parse(&row.get::<_, String>(5)?).unwrap_or(DeviceState::Active),
    })
}

// Closes `cur` at `end` (clamped so the interval never runs backwards)
// and removes the open row.
fn end_session_tx(tx: &Transaction<'_>, cur: &CurrentSession, end: DateTime<Utc>, reason: EndReason) -> Result<()> {
    let end = end.max(cur.start_time);
    let duration = (end - cur.start_time).num_seconds().max(0);

    tx.execute(
        INSERT_SESSION,
        params![
            cur.device_id,
            cur.app_id,
            cur.app_name,
            format_ts(cur.start_time),
            format_ts(end),
            duration,
            reason.as_str()
        ],
    )
    .context("insert closed session")?;

    tx.execute(DELETE_CURRENT, params![cur.device_id]).context("delete current session")?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn add_overlap(
    agg: &mut HashMap<(String, String, String), i64>,
    device_id: String,
    app_id: String,
    app_name: String,
    s_start: DateTime<Utc>,
    s_end: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    let clipped_start = start.max(s_start);
    let clipped_end = end.min(s_end);
    if clipped_end > clipped_start {
        let secs = (clipped_end - clipped_start).num_seconds().max(0);
        *agg.entry((device_id, app_id, app_name)).or_insert(0) += secs;
    }
}
