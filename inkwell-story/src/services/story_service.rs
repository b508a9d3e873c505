//! Story lifecycle: create, add sentences, complete
//!
//! Completion writes the `completed` status first and publishes
//! `story_completed` only after that write has committed, so any subscriber
//! (or sweep) that reads the story sees it completed.

use inkwell_common::db::{Comic, Sentence, Story};
use inkwell_common::events::{EventBus, InkwellEvent};
use inkwell_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

use super::EnrichmentCoordinator;
use crate::db::{comics, sentences, stories};

/// Suggested story length shown to writers; not enforced
pub const MAX_SENTENCES: i64 = 5;

/// A story with everything derived from it so far
#[derive(Debug, Clone, Serialize)]
pub struct StoryDetail {
    #[serde(flatten)]
    pub story: Story,
    pub sentences: Vec<Sentence>,
    pub comic: Option<Comic>,
}

/// Where the user stands on their current story
#[derive(Debug, Clone, Serialize)]
pub struct StoryProgress {
    pub story: Option<Story>,
    pub sentence_count: i64,
    pub max_sentences: i64,
}

pub struct StoryService {
    db: SqlitePool,
    event_bus: EventBus,
    coordinator: Arc<EnrichmentCoordinator>,
}

impl StoryService {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        coordinator: Arc<EnrichmentCoordinator>,
    ) -> Self {
        Self {
            db,
            event_bus,
            coordinator,
        }
    }

    pub async fn create_story(&self, user_id: i64, title: &str) -> Result<Story> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("Story title is empty".to_string()));
        }

        let story = stories::create_story(&self.db, user_id, title).await?;
        info!(story_id = story.id, user_id, "Story created");
        Ok(story)
    }

    pub async fn get_story(&self, story_id: i64) -> Result<StoryDetail> {
        let story = stories::get_story(&self.db, story_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Story {}", story_id)))?;
        let sentences = sentences::sentences_for_story(&self.db, story_id).await?;
        let comic = comics::comic_for_story(&self.db, story_id).await?;

        Ok(StoryDetail {
            story,
            sentences,
            comic,
        })
    }

    pub async fn list_stories(&self, user_id: Option<i64>) -> Result<Vec<Story>> {
        match user_id {
            Some(user_id) => stories::list_stories_by_user(&self.db, user_id).await,
            None => stories::list_stories(&self.db).await,
        }
    }

    pub async fn add_sentence(&self, story_id: i64, text: &str) -> Result<Sentence> {
        self.coordinator.add_sentence(story_id, text).await
    }

    /// Mark a story completed and notify subscribers
    ///
    /// Completing an already completed story succeeds without publishing again.
    pub async fn complete_story(&self, story_id: i64) -> Result<Story> {
        let story = stories::get_story(&self.db, story_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Story {}", story_id)))?;

        if story.is_completed() {
            debug!(story_id, "Story already completed");
            return Ok(story);
        }

        if stories::complete_story(&self.db, story_id).await? {
            let handlers = self.event_bus.publish(InkwellEvent::story_completed(story_id));
            info!(story_id, handlers, "Story completed");
        }

        stories::get_story(&self.db, story_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Story {}", story_id)))
    }

    pub async fn story_progress(&self, user_id: i64) -> Result<StoryProgress> {
        let story = stories::current_story_for_user(&self.db, user_id).await?;
        let sentence_count = match &story {
            Some(story) => sentences::count_for_story(&self.db, story.id).await?,
            None => 0,
        };

        Ok(StoryProgress {
            story,
            sentence_count,
            max_sentences: MAX_SENTENCES,
        })
    }
}
