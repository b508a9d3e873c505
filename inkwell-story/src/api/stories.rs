//! Story endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use inkwell_common::db::{Sentence, Story};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::services::story_service::StoryDetail;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateStoryRequest {
    pub user_id: i64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct AddSentenceRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ListStoriesQuery {
    pub user_id: Option<i64>,
}

/// POST /stories
pub async fn create_story(
    State(state): State<AppState>,
    Json(request): Json<CreateStoryRequest>,
) -> ApiResult<(StatusCode, Json<Story>)> {
    let story = state
        .stories
        .create_story(request.user_id, &request.title)
        .await?;
    Ok((StatusCode::CREATED, Json(story)))
}

/// GET /stories[?user_id=]
pub async fn list_stories(
    State(state): State<AppState>,
    Query(query): Query<ListStoriesQuery>,
) -> ApiResult<Json<Vec<Story>>> {
    Ok(Json(state.stories.list_stories(query.user_id).await?))
}

/// GET /stories/:id
pub async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<i64>,
) -> ApiResult<Json<StoryDetail>> {
    Ok(Json(state.stories.get_story(story_id).await?))
}

/// POST /stories/:id/sentences
///
/// Succeeds even when correction or illustration failed; the stored
/// feedback and image fields show what happened.
pub async fn add_sentence(
    State(state): State<AppState>,
    Path(story_id): Path<i64>,
    Json(request): Json<AddSentenceRequest>,
) -> ApiResult<(StatusCode, Json<Sentence>)> {
    let sentence = state.stories.add_sentence(story_id, &request.text).await?;
    Ok((StatusCode::CREATED, Json(sentence)))
}

/// POST /stories/:id/complete
///
/// The comic and analysis are produced in the background.
pub async fn complete_story(
    State(state): State<AppState>,
    Path(story_id): Path<i64>,
) -> ApiResult<Json<Story>> {
    Ok(Json(state.stories.complete_story(story_id).await?))
}

pub fn story_routes() -> Router<AppState> {
    Router::new()
        .route("/stories", post(create_story).get(list_stories))
        .route("/stories/:id", get(get_story))
        .route("/stories/:id/sentences", post(add_sentence))
        .route("/stories/:id/complete", post(complete_story))
}
