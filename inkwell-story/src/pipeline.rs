//! Service wiring
//!
//! Builds every pipeline service from a pool, the event bus and the external
//! clients. `main` and the integration tests assemble the service the same
//! way; only the clients differ.

use inkwell_common::events::EventBus;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::clients::{ImageGenerator, StoryCritic, TextCorrector};
use crate::services::comic::ComicRenderer;
use crate::services::{
    subscribers, AnalysisGenerator, ComicAssembler, EnrichmentCoordinator, ProgressAggregator,
    ReconciliationSweeps, StoryService,
};

/// External collaborators of the pipeline
#[derive(Clone)]
pub struct Clients {
    pub corrector: Arc<dyn TextCorrector>,
    pub images: Arc<dyn ImageGenerator>,
    pub critic: Arc<dyn StoryCritic>,
    pub renderer: Arc<dyn ComicRenderer>,
}

/// Every service, built once and shared
#[derive(Clone)]
pub struct Pipeline {
    pub stories: Arc<StoryService>,
    pub comics: Arc<ComicAssembler>,
    pub analyses: Arc<AnalysisGenerator>,
    pub sweeps: Arc<ReconciliationSweeps>,
    pub progress: Arc<ProgressAggregator>,
}

impl Pipeline {
    pub fn new(
        db: SqlitePool,
        event_bus: &EventBus,
        clients: Clients,
        working_dir: PathBuf,
        claim_lease_secs: u64,
    ) -> Self {
        let coordinator = Arc::new(EnrichmentCoordinator::new(
            db.clone(),
            clients.corrector,
            clients.images,
        ));
        let comics = Arc::new(ComicAssembler::new(
            db.clone(),
            clients.renderer,
            working_dir,
            claim_lease_secs,
            event_bus.clone(),
        ));
        let analyses = Arc::new(AnalysisGenerator::new(
            db.clone(),
            clients.critic,
            claim_lease_secs,
            event_bus.clone(),
        ));

        Self {
            stories: Arc::new(StoryService::new(db.clone(), event_bus.clone(), coordinator)),
            sweeps: Arc::new(ReconciliationSweeps::new(
                db.clone(),
                Arc::clone(&comics),
                Arc::clone(&analyses),
            )),
            progress: Arc::new(ProgressAggregator::new(db)),
            comics,
            analyses,
        }
    }

    /// Attach the `story_completed` handlers; call before sweeps or serving
    pub fn register_subscribers(&self, event_bus: &EventBus) {
        subscribers::register(event_bus, Arc::clone(&self.comics), Arc::clone(&self.analyses));
    }
}
