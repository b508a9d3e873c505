//! `story_completed` subscribers
//!
//! Registered on the bus at startup, before any sweep runs or request is
//! served. Each handler runs on its own task; errors are returned to the bus
//! supervisor, which logs them. A failed handler leaves the story for the
//! next sweep.

use async_trait::async_trait;
use inkwell_common::events::{EventBus, EventHandler, InkwellEvent, STORY_COMPLETED};
use std::sync::Arc;
use tracing::info;

use super::{AnalysisGenerator, ComicAssembler};

pub struct ComicOnCompletion {
    assembler: Arc<ComicAssembler>,
}

#[async_trait]
impl EventHandler for ComicOnCompletion {
    fn name(&self) -> &'static str {
        "comic_assembler"
    }

    async fn handle(&self, event: &InkwellEvent) -> anyhow::Result<()> {
        let InkwellEvent::StoryCompleted { story_id, .. } = event else {
            return Ok(());
        };

        info!(story_id, "Story completed: generating comic");
        let outcome = self.assembler.generate_comic(*story_id).await?;
        info!(story_id, outcome = ?outcome, "Comic handler finished");
        Ok(())
    }
}

pub struct AnalysisOnCompletion {
    generator: Arc<AnalysisGenerator>,
}

#[async_trait]
impl EventHandler for AnalysisOnCompletion {
    fn name(&self) -> &'static str {
        "analysis_generator"
    }

    async fn handle(&self, event: &InkwellEvent) -> anyhow::Result<()> {
        let InkwellEvent::StoryCompleted { story_id, .. } = event else {
            return Ok(());
        };

        info!(story_id, "Story completed: generating analysis");
        let outcome = self.generator.analyze_story(*story_id).await?;
        info!(story_id, outcome = ?outcome, "Analysis handler finished");
        Ok(())
    }
}

/// Subscribe the comic assembler and analysis generator to `story_completed`
pub fn register(
    bus: &EventBus,
    assembler: Arc<ComicAssembler>,
    generator: Arc<AnalysisGenerator>,
) {
    bus.subscribe(STORY_COMPLETED, Arc::new(ComicOnCompletion { assembler }));
    bus.subscribe(STORY_COMPLETED, Arc::new(AnalysisOnCompletion { generator }));
    info!(
        handlers = bus.handler_count(STORY_COMPLETED),
        "Registered story_completed subscribers"
    );
}
