//! inkwell-story library interface
//!
//! Story enrichment and reconciliation pipeline: sentence enrichment,
//! comic assembly, story analysis, reconciliation sweeps and progress
//! reporting, plus the thin HTTP layer in front of them.

pub mod api;
pub mod clients;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};
pub use crate::pipeline::{Clients, Pipeline};

use axum::Router;
use chrono::{DateTime, Utc};
use inkwell_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{ComicAssembler, ProgressAggregator, StoryService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus; `/events` watches its observer feed
    pub event_bus: EventBus,
    pub stories: Arc<StoryService>,
    pub comics: Arc<ComicAssembler>,
    pub progress: Arc<ProgressAggregator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, pipeline: &Pipeline) -> Self {
        Self {
            db,
            event_bus,
            stories: Arc::clone(&pipeline.stories),
            comics: Arc::clone(&pipeline.comics),
            progress: Arc::clone(&pipeline.progress),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::story_routes())
        .merge(api::user_routes())
        .merge(api::comic_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .with_state(state)
}
