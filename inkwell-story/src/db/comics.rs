//! Comic record database operations

use inkwell_common::db::{Comic, NewComic};
use inkwell_common::Result;
use sqlx::SqlitePool;

use crate::utils::{db_retry::DEFAULT_MAX_LOCK_WAIT_MS, retry_on_lock};

const COMIC_COLUMNS: &str =
    "id, user_id, story_id, title, thumbnail, view_url, download_url, done_on";

/// Save the comic for a story, returning its id
///
/// Updates the existing record for the story if there is one, so repeated
/// assembly leaves exactly one row.
pub async fn save_comic(pool: &SqlitePool, comic: &NewComic) -> Result<i64> {
    retry_on_lock("save_comic", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let mut tx = pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM comics WHERE story_id = ? ORDER BY id LIMIT 1")
                .bind(comic.story_id)
                .fetch_optional(&mut *tx)
                .await?;

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE comics
                    SET user_id = ?, title = ?, thumbnail = ?, view_url = ?, download_url = ?, done_on = ?
                    WHERE id = ?
                    "#,
                )
                .bind(comic.user_id)
                .bind(&comic.title)
                .bind(&comic.thumbnail)
                .bind(&comic.view_url)
                .bind(&comic.download_url)
                .bind(comic.done_on)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => sqlx::query(
                r#"
                INSERT INTO comics (user_id, story_id, title, thumbnail, view_url, download_url, done_on)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(comic.user_id)
            .bind(comic.story_id)
            .bind(&comic.title)
            .bind(&comic.thumbnail)
            .bind(&comic.view_url)
            .bind(&comic.download_url)
            .bind(comic.done_on)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        tx.commit().await?;
        Ok(id)
    })
    .await
}

pub async fn comic_for_story(pool: &SqlitePool, story_id: i64) -> Result<Option<Comic>> {
    let comic = sqlx::query_as::<_, Comic>(&format!(
        "SELECT {} FROM comics WHERE story_id = ? ORDER BY id LIMIT 1",
        COMIC_COLUMNS
    ))
    .bind(story_id)
    .fetch_optional(pool)
    .await?;

    Ok(comic)
}

pub async fn comics_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Comic>> {
    let comics = sqlx::query_as::<_, Comic>(&format!(
        "SELECT {} FROM comics WHERE user_id = ? ORDER BY done_on DESC, id DESC",
        COMIC_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(comics)
}

pub async fn count_for_story(pool: &SqlitePool, story_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comics WHERE story_id = ?")
        .bind(story_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
