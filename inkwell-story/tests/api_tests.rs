//! HTTP API integration tests
//!
//! Requests go through the full router with `oneshot`; enrichment clients,
//! critic and renderer are the mocks from `helpers`.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use helpers::TestEnv;
use http_body_util::BodyExt;
use inkwell_story::build_router;
use inkwell_story::db::assessments;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(env: &TestEnv, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let app = build_router(env.app_state());
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get_json(env: &TestEnv, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(env, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(env: &TestEnv, uri: &str, payload: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = send(env, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_reports_subscribers() {
    let env = TestEnv::new().await;
    let (status, body) = get_json(&env, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "inkwell-story");
    assert_eq!(body["story_completed_handlers"], 2);
}

#[tokio::test]
async fn test_health_degraded_without_subscribers() {
    let env = TestEnv::without_subscribers().await;
    let (status, body) = get_json(&env, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["story_completed_handlers"], 0);
}

#[tokio::test]
async fn test_story_lifecycle_over_http() {
    let env = TestEnv::new().await;

    let (status, story) = post_json(&env, "/stories", json!({"user_id": 7, "title": "Test"})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(story["status"], "in_progress");
    assert_eq!(story["content"], "");
    let id = story["id"].as_i64().unwrap();

    let (status, sentence) = post_json(
        &env,
        &format!("/stories/{}/sentences", id),
        json!({"text": "The owl hooted."}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sentence["story_id"], id);
    assert_eq!(sentence["corrected_text"], "The owl hooted.");
    assert_eq!(sentence["feedback"], helpers::MOCK_FEEDBACK);

    let (status, completed) =
        post_json(&env, &format!("/stories/{}/complete", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    env.bus.drain().await;

    let (status, detail) = get_json(&env, &format!("/stories/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["id"], id);
    assert_eq!(detail["content"], "The owl hooted.");
    assert_eq!(detail["sentences"].as_array().unwrap().len(), 1);
    assert_eq!(detail["comic"]["story_id"], id);
    assert_eq!(detail["performance_score"], 75);

    let (status, listed) = get_json(&env, "/stories?user_id=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let (_, others) = get_json(&env, "/stories?user_id=8").await;
    assert!(others.as_array().unwrap().is_empty());

    let (status, comics) = get_json(&env, "/users/7/comics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comics.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_title_rejected() {
    let env = TestEnv::new().await;
    let (status, body) = post_json(&env, "/stories", json!({"user_id": 1, "title": "  "})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_sentence_on_completed_story_conflicts() {
    let env = TestEnv::new().await;
    let id = env.completed_story(1, "Closed", &["The end."]).await;

    let (status, body) = post_json(
        &env,
        &format!("/stories/{}/sentences", id),
        json!({"text": "One more."}),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_missing_story_is_404() {
    let env = TestEnv::new().await;

    let (status, body) = get_json(&env, "/stories/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = post_json(&env, "/stories/9999/complete", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comic_download() {
    let env = TestEnv::without_subscribers().await;
    let id = env.completed_story(1, "Printed", &["Ink dried."]).await;
    env.pipeline.comics.generate_comic(id).await.unwrap();

    let request = Request::builder()
        .uri(format!("/comics/comic_{}.pdf", id))
        .body(Body::empty())
        .unwrap();
    let app = build_router(env.app_state());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_comic_download_rejects_bad_names() {
    let env = TestEnv::new().await;

    let (status, _) = get_json(&env, "/comics/comic_404.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get_json(&env, "/comics/comic..pdf").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_progress_requires_completed_assessment() {
    let env = TestEnv::new().await;
    let (status, body) = get_json(&env, "/users/5/progress").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_progress_report() {
    let env = TestEnv::new().await;
    let t0 = Utc::now() - Duration::days(30);

    let first = assessments::insert_assessment(&env.db, 5, "s1", "grammar", 40, "completed", t0)
        .await
        .unwrap();
    let later = t0 + Duration::days(20);
    assessments::insert_assessment(&env.db, 5, "s2", "grammar", 70, "completed", later)
        .await
        .unwrap();
    let pending = t0 + Duration::days(25);
    assessments::insert_assessment(&env.db, 5, "s3", "grammar", 10, "pending", pending)
        .await
        .unwrap();
    for (question, correct) in [(1, true), (2, true), (3, false), (4, true)] {
        assessments::insert_answer(&env.db, first, question, 5, "answer", correct)
            .await
            .unwrap();
    }

    env.completed_story(5, "Scored", &["One.", "Two."]).await;
    env.bus.drain().await;

    let (status, report) = get_json(&env, "/users/5/progress").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["user_id"], 5);
    assert_eq!(report["initial"]["score"], 40);
    assert_eq!(report["latest"]["score"], 70);
    assert_eq!(report["improvement"], 30);
    assert_eq!(report["stats"]["total_stories"], 1);
    assert_eq!(report["stats"]["total_sentences"], 2);
    assert_eq!(report["stats"]["accuracy"], 75.0);
    assert_eq!(report["stats"]["average_performance"], 75.0);
}

#[tokio::test]
async fn test_story_progress_endpoint() {
    let env = TestEnv::new().await;
    let (_, story) = post_json(&env, "/stories", json!({"user_id": 3, "title": "Now"})).await;
    let id = story["id"].as_i64().unwrap();
    post_json(&env, &format!("/stories/{}/sentences", id), json!({"text": "First."})).await;

    let (status, body) = get_json(&env, "/users/3/story-progress").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["story"]["id"], id);
    assert_eq!(body["sentence_count"], 1);
    assert_eq!(body["max_sentences"], 5);
}
