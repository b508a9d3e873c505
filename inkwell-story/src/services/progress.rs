//! Progress Aggregator
//!
//! Read-only report comparing a user's first and most recent completed
//! assessments, plus story and answer statistics.

use chrono::{DateTime, Utc};
use inkwell_common::db::Assessment;
use inkwell_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{assessments, sentences, stories};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentSnapshot {
    pub assessment_id: i64,
    pub category: String,
    pub score: i64,
    pub taken_at: DateTime<Utc>,
}

impl From<&Assessment> for AssessmentSnapshot {
    fn from(a: &Assessment) -> Self {
        Self {
            assessment_id: a.id,
            category: a.category.clone(),
            score: a.score,
            taken_at: a.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressStats {
    pub total_stories: i64,
    pub total_sentences: i64,
    /// Percentage of correct answers; 0 without answers
    pub accuracy: f64,
    /// Mean score over the user's analysed stories
    pub average_performance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub user_id: i64,
    pub initial: AssessmentSnapshot,
    pub latest: AssessmentSnapshot,
    /// `latest.score - initial.score`
    pub improvement: i64,
    pub stats: ProgressStats,
}

pub struct ProgressAggregator {
    db: SqlitePool,
}

impl ProgressAggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// `NotFound` when the user has no completed assessment
    pub async fn progress(&self, user_id: i64) -> Result<ProgressReport> {
        let completed = assessments::completed_for_user(&self.db, user_id).await?;
        let (Some(initial), Some(latest)) = (completed.first(), completed.last()) else {
            return Err(Error::NotFound(format!(
                "No completed assessment for user {}",
                user_id
            )));
        };

        let total_stories = stories::count_stories_by_user(&self.db, user_id).await?;
        let total_sentences = sentences::count_for_user(&self.db, user_id).await?;
        let average_performance = stories::average_performance(&self.db, user_id).await?;
        let (answered, correct) = assessments::answer_totals(&self.db, user_id).await?;

        Ok(ProgressReport {
            user_id,
            initial: initial.into(),
            latest: latest.into(),
            improvement: latest.score - initial.score,
            stats: ProgressStats {
                total_stories,
                total_sentences,
                accuracy: accuracy_percent(correct, answered),
                average_performance,
            },
        })
    }
}

pub fn accuracy_percent(correct: i64, answered: i64) -> f64 {
    if answered <= 0 {
        0.0
    } else {
        correct as f64 / answered as f64 * 100.0
    }
}
