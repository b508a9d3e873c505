//! Story pipeline services
//!
//! - [`enrichment`]: per-sentence correction + illustration fan-out/join
//! - [`comic`]: comic assembly and rendering
//! - [`analysis`]: story critique
//! - [`sweeps`]: reconciliation of derived artifacts the event path missed
//! - [`subscribers`]: `story_completed` handlers wiring the above to the bus
//! - [`story_service`]: story lifecycle (create, add sentence, complete)
//! - [`progress`]: read-only progress aggregation

pub mod analysis;
pub mod comic;
pub mod enrichment;
pub mod progress;
pub mod story_service;
pub mod subscribers;
pub mod sweeps;

pub use analysis::AnalysisGenerator;
pub use comic::ComicAssembler;
pub use enrichment::EnrichmentCoordinator;
pub use progress::ProgressAggregator;
pub use story_service::StoryService;
pub use sweeps::{ReconciliationSweeps, SweepReport};

use inkwell_common::Result;
use sqlx::SqlitePool;
use std::future::Future;

use crate::db::claims::{self, ArtifactKind};

/// Result of asking for a derived artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedOutcome {
    /// This call produced (or re-produced) the artifact
    Produced,
    /// The artifact already existed; nothing was done
    AlreadyPresent,
    /// Another producer holds the claim for this story
    ClaimedElsewhere,
}

/// Run `work` while holding the `(story_id, kind)` claim
///
/// The claim is released whether `work` succeeds or fails, unless another
/// producer took it over after our lease ran out. A failed release is only
/// logged; the lease lets a later producer take over.
pub(crate) async fn with_claim<F, Fut>(
    db: &SqlitePool,
    story_id: i64,
    kind: ArtifactKind,
    lease_secs: u64,
    work: F,
) -> Result<DerivedOutcome>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<DerivedOutcome>>,
{
    let stale_before = inkwell_common::time::seconds_ago(lease_secs);

    let Some(claimed_at) = claims::try_claim(db, story_id, kind, stale_before).await? else {
        tracing::debug!(story_id, kind = %kind, "Artifact claimed by another producer, skipping");
        return Ok(DerivedOutcome::ClaimedElsewhere);
    };

    let result = work().await;

    match claims::release(db, story_id, kind, claimed_at).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(story_id, kind = %kind, "Artifact claim was taken over while working");
        }
        Err(e) => {
            tracing::warn!(story_id, kind = %kind, error = %e, "Failed to release artifact claim");
        }
    }

    result
}
