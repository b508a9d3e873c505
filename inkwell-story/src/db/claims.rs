//! Artifact claim markers
//!
//! A claim row says "story X is being processed for artifact kind K". The
//! event path and the sweep path both take a claim before producing a comic
//! or analysis, so only one of them does the work. A claim older than the
//! lease is treated as abandoned and may be taken over.

use chrono::{DateTime, Utc};
use inkwell_common::Result;
use sqlx::SqlitePool;
use std::fmt;

use crate::utils::{db_retry::DEFAULT_MAX_LOCK_WAIT_MS, retry_on_lock};

/// Derived artifact kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Comic,
    Analysis,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Comic => "comic",
            ArtifactKind::Analysis => "analysis",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Try to claim `(story_id, kind)`
///
/// Returns the lease timestamp written when the caller now owns the claim.
/// That timestamp identifies this holder; pass it back to [`release`].
/// `stale_before`: existing claims taken before this instant are taken over.
pub async fn try_claim(
    pool: &SqlitePool,
    story_id: i64,
    kind: ArtifactKind,
    stale_before: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    let now = Utc::now();

    retry_on_lock("try_claim", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            r#"
            INSERT INTO artifact_claims (story_id, kind, claimed_at)
            VALUES (?, ?, ?)
            ON CONFLICT(story_id, kind) DO UPDATE SET claimed_at = excluded.claimed_at
            WHERE artifact_claims.claimed_at < ?
            "#,
        )
        .bind(story_id)
        .bind(kind.as_str())
        .bind(now)
        .bind(stale_before)
        .execute(pool)
        .await?;

        Ok((result.rows_affected() == 1).then_some(now))
    })
    .await
}

/// Release a claim taken at `claimed_at`
///
/// A claim that was taken over after our lease expired belongs to the new
/// holder and is left alone. Returns whether our claim was still present.
pub async fn release(
    pool: &SqlitePool,
    story_id: i64,
    kind: ArtifactKind,
    claimed_at: DateTime<Utc>,
) -> Result<bool> {
    retry_on_lock("release_claim", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            "DELETE FROM artifact_claims WHERE story_id = ? AND kind = ? AND claimed_at = ?",
        )
        .bind(story_id)
        .bind(kind.as_str())
        .bind(claimed_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    })
    .await
}

/// Drop every claim; only valid before any producer of this process starts
pub async fn clear_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM artifact_claims")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
