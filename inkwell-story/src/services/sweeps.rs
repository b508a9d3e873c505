//! Reconciliation Sweeps
//!
//! The event bus does not persist deliveries, so a `story_completed` handled
//! by nobody (no subscriber yet, crash mid-handler, handler error) leaves a
//! completed story without its comic or analysis. The sweeps find those
//! stories and do the missing work one story at a time, logging and moving
//! on past individual failures.

use inkwell_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{AnalysisGenerator, ComicAssembler, DerivedOutcome};
use crate::db::stories;

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Stories found missing the artifact
    pub scanned: usize,
    pub produced: usize,
    /// Already present by the time we got there, or claimed by another producer
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: &Result<DerivedOutcome>) {
        match outcome {
            Ok(DerivedOutcome::Produced) => self.produced += 1,
            Ok(DerivedOutcome::AlreadyPresent) | Ok(DerivedOutcome::ClaimedElsewhere) => {
                self.skipped += 1
            }
            Err(_) => self.failed += 1,
        }
    }
}

pub struct ReconciliationSweeps {
    db: SqlitePool,
    comics: Arc<ComicAssembler>,
    analyses: Arc<AnalysisGenerator>,
}

impl ReconciliationSweeps {
    pub fn new(
        db: SqlitePool,
        comics: Arc<ComicAssembler>,
        analyses: Arc<AnalysisGenerator>,
    ) -> Self {
        Self {
            db,
            comics,
            analyses,
        }
    }

    /// Generate a comic for every completed story that has none
    ///
    /// Only the initial scan can fail the sweep.
    pub async fn sweep_missing_comics(&self) -> Result<SweepReport> {
        let pending = stories::stories_missing_comic(&self.db).await?;
        let mut report = SweepReport {
            scanned: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            info!("Comic sweep: every completed story has a comic");
            return Ok(report);
        }
        info!(count = pending.len(), "Comic sweep: stories without comics");

        for story in pending {
            let outcome = self.comics.generate_comic(story.id).await;
            match &outcome {
                Ok(result) => {
                    info!(story_id = story.id, outcome = ?result, "Comic sweep: story done")
                }
                Err(e) => warn!(story_id = story.id, error = %e, "Comic sweep: story failed"),
            }
            report.record(&outcome);
        }

        info!(
            scanned = report.scanned,
            produced = report.produced,
            skipped = report.skipped,
            failed = report.failed,
            "Comic sweep finished"
        );
        Ok(report)
    }

    /// Generate an analysis for every completed story that has none
    pub async fn sweep_missing_analyses(&self) -> Result<SweepReport> {
        let pending = stories::stories_missing_analysis(&self.db).await?;
        let mut report = SweepReport {
            scanned: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            info!("Analysis sweep: every completed story is analysed");
            return Ok(report);
        }
        info!(count = pending.len(), "Analysis sweep: stories without analysis");

        for story in pending {
            let outcome = self.analyses.analyze_story(story.id).await;
            match &outcome {
                Ok(result) => {
                    info!(story_id = story.id, outcome = ?result, "Analysis sweep: story done")
                }
                Err(e) => warn!(story_id = story.id, error = %e, "Analysis sweep: story failed"),
            }
            report.record(&outcome);
        }

        info!(
            scanned = report.scanned,
            produced = report.produced,
            skipped = report.skipped,
            failed = report.failed,
            "Analysis sweep finished"
        );
        Ok(report)
    }

    /// Both sweeps, concurrently with each other
    pub async fn run_all(&self) -> (Result<SweepReport>, Result<SweepReport>) {
        tokio::join!(self.sweep_missing_comics(), self.sweep_missing_analyses())
    }

    /// Run both sweeps now in the background, logging scan failures
    pub fn spawn_once(self: &Arc<Self>) -> JoinHandle<()> {
        let sweeps = Arc::clone(self);
        tokio::spawn(async move {
            sweeps.run_logged().await;
        })
    }

    /// Re-run both sweeps every `interval` until `cancel` fires
    ///
    /// The first pass happens one interval from now.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let sweeps = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Periodic sweeps stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweeps.run_logged().await;
                    }
                }
            }
        })
    }

    async fn run_logged(&self) {
        let (comics, analyses) = self.run_all().await;
        if let Err(e) = comics {
            error!(error = %e, "Comic sweep could not scan stories");
        }
        if let Err(e) = analyses {
            error!(error = %e, "Analysis sweep could not scan stories");
        }
    }
}
