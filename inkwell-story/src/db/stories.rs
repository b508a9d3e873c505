//! Story database operations

use chrono::Utc;
use inkwell_common::db::{join_tips, Story, StoryStatus};
use inkwell_common::Result;
use sqlx::SqlitePool;

use crate::utils::{retry_on_lock, db_retry::DEFAULT_MAX_LOCK_WAIT_MS};

const STORY_COLUMNS: &str = "id, user_id, title, content, status, analysis, tips, \
                             performance_score, created_at, updated_at";

/// Insert a new `in_progress` story with empty content
pub async fn create_story(pool: &SqlitePool, user_id: i64, title: &str) -> Result<Story> {
    let now = Utc::now();

    let id = sqlx::query(
        r#"
        INSERT INTO stories (user_id, title, content, status, created_at, updated_at)
        VALUES (?, ?, '', ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(title)
    .bind(StoryStatus::InProgress.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Story {
        id,
        user_id,
        title: title.to_string(),
        content: String::new(),
        status: StoryStatus::InProgress,
        analysis: None,
        tips: None,
        performance_score: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_story(pool: &SqlitePool, story_id: i64) -> Result<Option<Story>> {
    let story = sqlx::query_as::<_, Story>(&format!(
        "SELECT {} FROM stories WHERE id = ?",
        STORY_COLUMNS
    ))
    .bind(story_id)
    .fetch_optional(pool)
    .await?;

    Ok(story)
}

pub async fn list_stories(pool: &SqlitePool) -> Result<Vec<Story>> {
    let stories = sqlx::query_as::<_, Story>(&format!(
        "SELECT {} FROM stories ORDER BY id",
        STORY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(stories)
}

pub async fn list_stories_by_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Story>> {
    let stories = sqlx::query_as::<_, Story>(&format!(
        "SELECT {} FROM stories WHERE user_id = ? ORDER BY id",
        STORY_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(stories)
}

/// Most recently started story the user has not completed yet
pub async fn current_story_for_user(pool: &SqlitePool, user_id: i64) -> Result<Option<Story>> {
    let story = sqlx::query_as::<_, Story>(&format!(
        "SELECT {} FROM stories WHERE user_id = ? AND status = 'in_progress' \
         ORDER BY created_at DESC, id DESC LIMIT 1",
        STORY_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(story)
}

/// Move an `in_progress` story to `completed`
///
/// Returns false when no row changed (unknown id or already completed).
pub async fn complete_story(pool: &SqlitePool, story_id: i64) -> Result<bool> {
    let now = Utc::now();

    retry_on_lock("complete_story", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            "UPDATE stories SET status = 'completed', updated_at = ? \
             WHERE id = ? AND status = 'in_progress'",
        )
        .bind(now)
        .bind(story_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    })
    .await
}

/// Record the critique of a completed story
///
/// Only writes when the story is `completed` and has no analysis yet; returns
/// whether the row was updated.
pub async fn update_analysis(
    pool: &SqlitePool,
    story_id: i64,
    analysis: &str,
    tips: &[String],
    performance_score: i64,
) -> Result<bool> {
    let joined = join_tips(tips);
    let now = Utc::now();

    retry_on_lock("update_analysis", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            r#"
            UPDATE stories
            SET analysis = ?, tips = ?, performance_score = ?, updated_at = ?
            WHERE id = ? AND status = 'completed' AND analysis IS NULL
            "#,
        )
        .bind(analysis)
        .bind(&joined)
        .bind(performance_score)
        .bind(now)
        .bind(story_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    })
    .await
}

/// Completed stories that have no comic record
pub async fn stories_missing_comic(pool: &SqlitePool) -> Result<Vec<Story>> {
    let stories = sqlx::query_as::<_, Story>(&format!(
        "SELECT {} FROM stories s WHERE s.status = 'completed' \
         AND NOT EXISTS (SELECT 1 FROM comics c WHERE c.story_id = s.id) \
         ORDER BY s.id",
        STORY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(stories)
}

/// Completed stories whose analysis has not been recorded
pub async fn stories_missing_analysis(pool: &SqlitePool) -> Result<Vec<Story>> {
    let stories = sqlx::query_as::<_, Story>(&format!(
        "SELECT {} FROM stories WHERE status = 'completed' AND analysis IS NULL ORDER BY id",
        STORY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(stories)
}

/// Average performance score over the user's analysed stories
pub async fn average_performance(pool: &SqlitePool, user_id: i64) -> Result<f64> {
    let avg: Option<f64> = sqlx::query_scalar(
        "SELECT AVG(performance_score) FROM stories \
         WHERE user_id = ? AND performance_score IS NOT NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(avg.unwrap_or(0.0))
}

pub async fn count_stories_by_user(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stories WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
