//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::fmt;
use std::str::FromStr;

/// Story lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    InProgress,
    Completed,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::InProgress => "in_progress",
            StoryStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(StoryStatus::InProgress),
            "completed" => Ok(StoryStatus::Completed),
            other => Err(crate::Error::Internal(format!("Unknown story status: {}", other))),
        }
    }
}

/// Story row
///
/// `tips` is stored newline-joined and split on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub status: StoryStatus,
    pub analysis: Option<String>,
    pub tips: Option<Vec<String>>,
    pub performance_score: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    pub fn is_completed(&self) -> bool {
        self.status == StoryStatus::Completed
    }

    pub fn has_analysis(&self) -> bool {
        self.analysis.is_some()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Story {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<StoryStatus>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(e),
        })?;
        let tips: Option<String> = row.try_get("tips")?;

        Ok(Story {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            status,
            analysis: row.try_get("analysis")?,
            tips: tips.map(|joined| split_tips(&joined)),
            performance_score: row.try_get("performance_score")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Join tips for storage in a single TEXT column
pub fn join_tips(tips: &[String]) -> String {
    tips.iter()
        .map(|t| t.replace('\n', " "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inverse of [`join_tips`]; blank lines are dropped
pub fn split_tips(joined: &str) -> Vec<String> {
    joined
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Enriched sentence; immutable once written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Sentence {
    pub id: i64,
    pub story_id: i64,
    pub original_text: String,
    pub corrected_text: String,
    pub feedback: String,
    /// Relative to the working directory, or absolute
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sentence {
    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Sentence fields prior to insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewSentence {
    pub story_id: i64,
    pub original_text: String,
    pub corrected_text: String,
    pub feedback: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Rendered comic document record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Comic {
    pub id: i64,
    pub user_id: i64,
    pub story_id: i64,
    pub title: String,
    pub thumbnail: Option<String>,
    pub view_url: String,
    pub download_url: String,
    pub done_on: DateTime<Utc>,
}

/// Comic fields prior to insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewComic {
    pub user_id: i64,
    pub story_id: i64,
    pub title: String,
    pub thumbnail: Option<String>,
    pub view_url: String,
    pub download_url: String,
    pub done_on: DateTime<Utc>,
}

/// Writing assessment (read-only here; written by the assessment service)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Assessment {
    pub id: i64,
    pub user_id: i64,
    pub session_id: String,
    pub title: String,
    pub category: String,
    pub score: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
