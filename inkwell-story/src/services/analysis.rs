//! Analysis Generator
//!
//! Sends a completed story's content to the critic and stores the analysis
//! text, tips and score on the story. The write happens only after the reply
//! parsed completely, and only while the story still has no analysis, so the
//! fields are set at most once.

use chrono::Utc;
use inkwell_common::db::Story;
use inkwell_common::events::{EventBus, InkwellEvent};
use inkwell_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

use super::{with_claim, DerivedOutcome};
use crate::clients::StoryCritic;
use crate::db::claims::ArtifactKind;
use crate::db::stories;

pub struct AnalysisGenerator {
    db: SqlitePool,
    critic: Arc<dyn StoryCritic>,
    claim_lease_secs: u64,
    event_bus: EventBus,
}

impl AnalysisGenerator {
    pub fn new(
        db: SqlitePool,
        critic: Arc<dyn StoryCritic>,
        claim_lease_secs: u64,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            critic,
            claim_lease_secs,
            event_bus,
        }
    }

    /// Critique a completed story and record the result
    ///
    /// Upstream failures and malformed replies surface as `Upstream` errors
    /// with the story untouched.
    pub async fn analyze_story(&self, story_id: i64) -> Result<DerivedOutcome> {
        if self.load_completed(story_id).await?.has_analysis() {
            return Ok(DerivedOutcome::AlreadyPresent);
        }

        with_claim(
            &self.db,
            story_id,
            ArtifactKind::Analysis,
            self.claim_lease_secs,
            || async {
                let story = self.load_completed(story_id).await?;
                if story.has_analysis() {
                    debug!(story_id, "Analysis already recorded");
                    return Ok(DerivedOutcome::AlreadyPresent);
                }

                info!(story_id, content_len = story.content.len(), "Generating story analysis");

                let critique = self.critic.critique(&story.content).await?;

                let written = stories::update_analysis(
                    &self.db,
                    story_id,
                    &critique.analysis,
                    &critique.tips,
                    critique.performance_score,
                )
                .await?;

                if !written {
                    debug!(story_id, "Analysis written concurrently, discarding ours");
                    return Ok(DerivedOutcome::AlreadyPresent);
                }

                info!(
                    story_id,
                    tips = critique.tips.len(),
                    performance_score = critique.performance_score,
                    "Story analysis recorded"
                );

                self.event_bus.publish(InkwellEvent::AnalysisGenerated {
                    story_id,
                    performance_score: critique.performance_score,
                    timestamp: Utc::now(),
                });

                Ok(DerivedOutcome::Produced)
            },
        )
        .await
    }

    async fn load_completed(&self, story_id: i64) -> Result<Story> {
        let story = stories::get_story(&self.db, story_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Story {}", story_id)))?;

        if !story.is_completed() {
            return Err(Error::InvalidState(format!(
                "Story {} is not completed",
                story_id
            )));
        }

        Ok(story)
    }
}
