//! JSON query surface over the session store.
//!
//! Read-only views: current device status, closed-session history, and
//! today's aggregated usage. The server shares the store with the poll
//! loops and shuts down gracefully with a bounded drain window.

use crate::db::sessions::SessionStore;
use crate::libs::clock::Clock;
use crate::libs::config::AppTimezone;
use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// How long in-flight connections get to finish after shutdown begins.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub clock: Arc<dyn Clock>,
    pub tz: AppTimezone,
    pub day_start_hour: u8,
}

/// Handler-level error, rendered as a JSON error document.
pub enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "An internal error occurred".to_string())
            }
        };
        let body = Json(json!({ "error": { "code": code, "message": message } }));
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/healthz", get(handle_healthz))
        .route("/status", get(handle_status))
        .route("/sessions", get(handle_sessions))
        .route("/usage/today", get(handle_usage_today))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the server until `token` is cancelled, then drains for up to
/// [`SHUTDOWN_DRAIN`] before forcing the close.
pub async fn serve(listen: &str, app: Router, token: CancellationToken) -> Result<()> {
    let addr = normalize_listen(listen);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("bind {addr}"))?;
    tracing::info!(addr = %addr, "http server listening");

    let shutdown = token.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    tokio::select! {
        res = &mut server => {
            res.context("http server task")?.context("http server error")?;
            return Ok(());
        }
        _ = token.cancelled() => {}
    }

    match tokio::time::timeout(SHUTDOWN_DRAIN, &mut server).await {
        Ok(res) => res.context("http server task")?.context("http server error")?,
        Err(_) => {
            tracing::warn!("drain window elapsed, closing remaining connections");
            server.abort();
        }
    }
    tracing::info!("http server shut down");
    Ok(())
}

/// Accepts Go-style `:8080` listen strings alongside full `host:port`
/// addresses.
pub fn normalize_listen(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(json!({ "endpoints": ["/", "/healthz", "/status", "/sessions", "/usage/today"] }))
}

async fn handle_healthz() -> &'static str {
    "ok\n"
}

async fn handle_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let devices = state.store.current_sessions()?;
    Ok(Json(json!({ "devices": devices })))
}

#[derive(Debug, Deserialize)]
struct SessionsQuery {
    device_id: Option<String>,
    since: Option<String>,
    until: Option<String>,
}

async fn handle_sessions(State(state): State<AppState>, Query(query): Query<SessionsQuery>) -> Result<Json<serde_json::Value>, ApiError> {
    let since = parse_time_param("since", query.since.as_deref())?;
    let until = parse_time_param("until", query.until.as_deref())?;

    let sessions = state.store.sessions(query.device_id.as_deref(), since, until)?;
    Ok(Json(json!({ "sessions": sessions })))
}

fn parse_time_param(name: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| ApiError::BadRequest(format!("invalid {name} parameter"))),
    }
}

#[derive(Debug, Deserialize)]
struct UsageQuery {
    device_id: Option<String>,
    start_hour: Option<u8>,
}

#[derive(Serialize)]
struct DurationBreakdown {
    hours: i64,
    minutes: i64,
}

#[derive(Serialize)]
struct AppUsage {
    app_id: String,
    app_name: String,
    total_seconds: i64,
    duration: DurationBreakdown,
}

#[derive(Serialize)]
struct DeviceUsage {
    device_id: String,
    apps: Vec<AppUsage>,
}

#[derive(Serialize)]
struct UsageTodayResponse {
    day_start: DateTime<Utc>,
    now: DateTime<Utc>,
    device_usage: Vec<DeviceUsage>,
}

async fn handle_usage_today(State(state): State<AppState>, Query(query): Query<UsageQuery>) -> Result<Json<UsageTodayResponse>, ApiError> {
    let day_start_hour = match query.start_hour {
        Some(hour) if hour <= 23 => hour,
        _ => state.day_start_hour,
    };

    let (day_start, now) = state.tz.day_window(day_start_hour, state.clock.now());
    let entries = state.store.usage_between(day_start, now, query.device_id.as_deref())?;

    // Entries come back sorted by (device, app), so grouping preserves a
    // deterministic order.
    let mut devices: Vec<DeviceUsage> = Vec::new();
    for entry in entries {
        let app = AppUsage {
            app_id: entry.app_id,
            app_name: entry.app_name,
            total_seconds: entry.total_seconds,
            duration: DurationBreakdown {
                hours: entry.total_seconds / 3600,
                minutes: (entry.total_seconds % 3600) / 60,
            },
        };
        match devices.last_mut() {
            Some(device) if device.device_id == entry.device_id => device.apps.push(app),
            _ => devices.push(DeviceUsage {
                device_id: entry.device_id,
                apps: vec![app],
            }),
        }
    }

    Ok(Json(UsageTodayResponse {
        day_start,
        now,
        device_usage: devices,
    }))
}
