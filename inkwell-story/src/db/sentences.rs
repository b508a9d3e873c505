//! Sentence database operations

use inkwell_common::db::{NewSentence, Sentence};
use inkwell_common::{Error, Result};
use sqlx::SqlitePool;

use crate::utils::{db_retry::DEFAULT_MAX_LOCK_WAIT_MS, retry_on_lock};

/// Insert an enriched sentence and append its original text to the story
///
/// Both writes share one transaction. The append is a single
/// `content || ' ' || ?` statement so concurrent additions to the same story
/// cannot lose each other's text. Fails with `InvalidState` (and writes
/// nothing) when the story is missing or no longer `in_progress`.
pub async fn insert_sentence(pool: &SqlitePool, sentence: &NewSentence) -> Result<Sentence> {
    retry_on_lock("insert_sentence", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let mut tx = pool.begin().await?;

        let appended = sqlx::query(
            r#"
            UPDATE stories
            SET content = CASE WHEN content = '' THEN ? ELSE content || ' ' || ? END,
                updated_at = ?
            WHERE id = ? AND status = 'in_progress'
            "#,
        )
        .bind(&sentence.original_text)
        .bind(&sentence.original_text)
        .bind(sentence.created_at)
        .bind(sentence.story_id)
        .execute(&mut *tx)
        .await?;

        if appended.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::InvalidState(format!(
                "Story {} is not accepting sentences",
                sentence.story_id
            )));
        }

        let id = sqlx::query(
            r#"
            INSERT INTO sentences (story_id, original_text, corrected_text, feedback, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sentence.story_id)
        .bind(&sentence.original_text)
        .bind(&sentence.corrected_text)
        .bind(&sentence.feedback)
        .bind(&sentence.image_url)
        .bind(sentence.created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        Ok(Sentence {
            id,
            story_id: sentence.story_id,
            original_text: sentence.original_text.clone(),
            corrected_text: sentence.corrected_text.clone(),
            feedback: sentence.feedback.clone(),
            image_url: sentence.image_url.clone(),
            created_at: sentence.created_at,
        })
    })
    .await
}

/// Sentences of a story in creation order
pub async fn sentences_for_story(pool: &SqlitePool, story_id: i64) -> Result<Vec<Sentence>> {
    let sentences = sqlx::query_as::<_, Sentence>(
        r#"
        SELECT id, story_id, original_text, corrected_text, feedback, image_url, created_at
        FROM sentences
        WHERE story_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(story_id)
    .fetch_all(pool)
    .await?;

    Ok(sentences)
}

pub async fn count_for_story(pool: &SqlitePool, story_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sentences WHERE story_id = ?")
        .bind(story_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Sentences across all of a user's stories
pub async fn count_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sentences se JOIN stories st ON st.id = se.story_id \
         WHERE st.user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
