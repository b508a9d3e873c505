//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use inkwell_common::events::STORY_COMPLETED;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when nothing handles `story_completed`
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Subscribers registered for `story_completed`
    pub story_completed_handlers: usize,
    /// Handler tasks still running
    pub handlers_in_flight: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;
    let story_completed_handlers = state.event_bus.handler_count(STORY_COMPLETED);

    Json(HealthResponse {
        status: if story_completed_handlers > 0 { "ok" } else { "degraded" }.to_string(),
        module: "inkwell-story".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        story_completed_handlers,
        handlers_in_flight: state.event_bus.in_flight(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
