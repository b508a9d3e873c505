//! Assessment and answer queries used by progress reporting
//!
//! Assessments are owned by the assessment flow; this service only reads
//! them. The insert helpers exist for seeding and tests.

use chrono::{DateTime, Utc};
use inkwell_common::db::Assessment;
use inkwell_common::Result;
use sqlx::SqlitePool;

const ASSESSMENT_COLUMNS: &str =
    "id, user_id, session_id, title, category, score, status, created_at";

/// Completed assessments of a user, oldest first
pub async fn completed_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Assessment>> {
    let assessments = sqlx::query_as::<_, Assessment>(&format!(
        "SELECT {} FROM assessments WHERE user_id = ? AND status = 'completed' \
         ORDER BY created_at, id",
        ASSESSMENT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(assessments)
}

/// (answered, correct) over every answer the user gave
pub async fn answer_totals(pool: &SqlitePool, user_id: i64) -> Result<(i64, i64)> {
    let (total, correct): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), SUM(CASE WHEN is_correct != 0 THEN 1 ELSE 0 END) \
         FROM answers WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok((total, correct.unwrap_or(0)))
}

pub async fn insert_assessment(
    pool: &SqlitePool,
    user_id: i64,
    session_id: &str,
    category: &str,
    score: i64,
    status: &str,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO assessments (user_id, session_id, title, category, score, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(session_id)
    .bind(format!("{} assessment", category))
    .bind(category)
    .bind(score)
    .bind(status)
    .bind(created_at)
    .bind(created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn insert_answer(
    pool: &SqlitePool,
    assessment_id: i64,
    question_id: i64,
    user_id: i64,
    answer: &str,
    is_correct: bool,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO answers (assessment_id, question_id, user_id, answer, is_correct, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(assessment_id)
    .bind(question_id)
    .bind(user_id)
    .bind(answer)
    .bind(is_correct)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}
