//! Event types for the Inkwell event system
//!
//! Provides the shared event definitions, the [`EventHandler`] trait and the
//! handler-dispatching [`EventBus`].

mod bus;

pub use bus::{handler_fn, EventBus, FnHandler};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Topic published once a story's status has been persisted as `completed`
pub const STORY_COMPLETED: &str = "story_completed";
/// Topic published after a comic record has been written
pub const COMIC_GENERATED: &str = "comic_generated";
/// Topic published after analysis fields have been written
pub const ANALYSIS_GENERATED: &str = "analysis_generated";

/// Inkwell event types
///
/// Every variant maps to exactly one topic (see [`InkwellEvent::topic`]).
/// Events are cloned into each handler task and serialized for SSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InkwellEvent {
    /// A story moved to `completed`
    ///
    /// Triggers:
    /// - Comic Assembler
    /// - Analysis Generator
    StoryCompleted {
        story_id: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A comic document was rendered and its record saved
    ComicGenerated {
        story_id: i64,
        comic_id: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narrative analysis, tips and score were stored on the story
    AnalysisGenerated {
        story_id: i64,
        performance_score: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl InkwellEvent {
    pub fn story_completed(story_id: i64) -> Self {
        InkwellEvent::StoryCompleted {
            story_id,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Topic name this event is published under
    pub fn topic(&self) -> &'static str {
        match self {
            InkwellEvent::StoryCompleted { .. } => STORY_COMPLETED,
            InkwellEvent::ComicGenerated { .. } => COMIC_GENERATED,
            InkwellEvent::AnalysisGenerated { .. } => ANALYSIS_GENERATED,
        }
    }

    /// Story the event is about
    pub fn story_id(&self) -> i64 {
        match self {
            InkwellEvent::StoryCompleted { story_id, .. }
            | InkwellEvent::ComicGenerated { story_id, .. }
            | InkwellEvent::AnalysisGenerated { story_id, .. } => *story_id,
        }
    }
}

/// Subscriber callback registered on the [`EventBus`]
///
/// Handlers run on their own task. A returned error (or a panic) is logged by
/// the bus and goes no further: the publisher and sibling handlers never see it.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &InkwellEvent) -> anyhow::Result<()>;
}
