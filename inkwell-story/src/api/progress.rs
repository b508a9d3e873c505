//! Per-user endpoints: progress report, current story, comics

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use inkwell_common::db::Comic;

use crate::db::comics;
use crate::error::ApiResult;
use crate::services::progress::ProgressReport;
use crate::services::story_service::StoryProgress;
use crate::AppState;

/// GET /users/:id/progress
pub async fn user_progress(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<ProgressReport>> {
    Ok(Json(state.progress.progress(user_id).await?))
}

/// GET /users/:id/story-progress
pub async fn story_progress(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<StoryProgress>> {
    Ok(Json(state.stories.story_progress(user_id).await?))
}

/// GET /users/:id/comics
pub async fn user_comics(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<Comic>>> {
    Ok(Json(comics::comics_for_user(&state.db, user_id).await?))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id/progress", get(user_progress))
        .route("/users/:id/story-progress", get(story_progress))
        .route("/users/:id/comics", get(user_comics))
}
