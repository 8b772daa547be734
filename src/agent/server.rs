//! Roku-compatible HTTP surface for the agent.
//!
//! The wire format only carries an app id and name, so device state is
//! bridged through the protocol: an active app is reported verbatim, an
//! idle machine reports an empty app name (which the aggregator's
//! classifier reads back as idle), and a failed probe answers 503 (which
//! the aggregator records as offline).

use crate::agent::detector::Detector;
use crate::db::sessions::DeviceState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

#[derive(Clone)]
struct AgentState {
    detector: Arc<Detector>,
}

#[derive(Serialize)]
#[serde(rename = "active-app")]
struct ActiveAppDoc {
    app: AppElement,
}

#[derive(Serialize)]
struct AppElement {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "$text")]
    name: String,
}

pub fn router(detector: Arc<Detector>) -> Router {
    Router::new()
        .route("/query/active-app", get(handle_active_app))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(AgentState { detector })
}

async fn handle_active_app(State(state): State<AgentState>) -> Response {
    let activity = state.detector.detect().await;

    if activity.state == DeviceState::Offline {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let name = match activity.state {
        DeviceState::Active => activity.name,
        _ => String::new(),
    };
    let doc = ActiveAppDoc {
        app: AppElement { id: activity.id, name },
    };

    match quick_xml::se::to_string(&doc) {
        Ok(xml) => ([(header::CONTENT_TYPE, "application/xml")], format!("{XML_HEADER}{xml}")).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "error encoding active-app response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle_health() -> &'static str {
    "ok\n"
}
