//! Comic Assembler
//!
//! Renders a completed story's sentences and images into one document at
//! `<working_dir>/comics/comic_<story_id>.<ext>` and records a single Comic
//! row for the story. Invoked by the `story_completed` subscriber and by the
//! comic sweep; both go through the same artifact claim.

pub mod renderer;

pub use renderer::{ComicDocument, ComicRenderer, Panel, PdfComicRenderer};

use chrono::Utc;
use inkwell_common::db::{NewComic, Sentence, Story};
use inkwell_common::events::{EventBus, InkwellEvent};
use inkwell_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{with_claim, DerivedOutcome};
use crate::db::claims::ArtifactKind;
use crate::db::{comics, sentences, stories};

/// Directory under the working directory that holds rendered comics
pub const COMICS_SUBDIR: &str = "comics";

/// Builds and records comics for completed stories
pub struct ComicAssembler {
    db: SqlitePool,
    renderer: Arc<dyn ComicRenderer>,
    working_dir: PathBuf,
    claim_lease_secs: u64,
    event_bus: EventBus,
}

impl ComicAssembler {
    pub fn new(
        db: SqlitePool,
        renderer: Arc<dyn ComicRenderer>,
        working_dir: PathBuf,
        claim_lease_secs: u64,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            renderer,
            working_dir,
            claim_lease_secs,
            event_bus,
        }
    }

    pub fn comics_dir(&self) -> PathBuf {
        self.working_dir.join(COMICS_SUBDIR)
    }

    /// File name of a story's rendered comic
    pub fn artifact_name(&self, story_id: i64) -> String {
        format!("comic_{}.{}", story_id, self.renderer.extension())
    }

    pub fn content_type(&self) -> &'static str {
        self.renderer.content_type()
    }

    /// Produce the comic for a completed story
    ///
    /// Errors (missing story, not completed, render, write or persistence
    /// failure) leave no Comic row behind; the story stays eligible for the
    /// next sweep.
    pub async fn generate_comic(&self, story_id: i64) -> Result<DerivedOutcome> {
        self.load_completed(story_id).await?;

        with_claim(
            &self.db,
            story_id,
            ArtifactKind::Comic,
            self.claim_lease_secs,
            || async {
                // Another producer may have finished between our query and our claim
                if comics::comic_for_story(&self.db, story_id).await?.is_some() {
                    debug!(story_id, "Comic already recorded");
                    return Ok(DerivedOutcome::AlreadyPresent);
                }

                let story = self.load_completed(story_id).await?;
                self.assemble(&story).await?;
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

    async fn assemble(&self, story: &Story) -> Result<i64> {
        info!(story_id = story.id, title = %story.title, "Generating comic");

        let sentences = sentences::sentences_for_story(&self.db, story.id).await?;
        debug!(story_id = story.id, sentences = sentences.len(), "Loaded sentences");

        let document = build_document(story, &sentences, &self.working_dir);
        let renderer = Arc::clone(&self.renderer);
        let bytes = tokio::task::spawn_blocking(move || renderer.render(&document))
            .await
            .map_err(|e| Error::Internal(format!("Render task failed: {}", e)))??;

        let file_name = self.artifact_name(story.id);
        let output_path = self.comics_dir().join(&file_name);
        write_artifact(&output_path, &bytes).await?;
        info!(
            story_id = story.id,
            path = %output_path.display(),
            size = bytes.len(),
            "Comic written"
        );

        let location = format!("{}/{}", COMICS_SUBDIR, file_name);
        let comic_id = comics::save_comic(
            &self.db,
            &NewComic {
                user_id: story.user_id,
                story_id: story.id,
                title: story.title.clone(),
                thumbnail: select_thumbnail(&sentences),
                view_url: location.clone(),
                download_url: location,
                done_on: Utc::now(),
            },
        )
        .await?;

        info!(story_id = story.id, comic_id, "Comic recorded");

        self.event_bus.publish(InkwellEvent::ComicGenerated {
            story_id: story.id,
            comic_id,
            timestamp: Utc::now(),
        });

        Ok(comic_id)
    }
}

/// Panels in sentence order: image (if any) plus corrected text
pub fn build_document(story: &Story, sentences: &[Sentence], working_dir: &Path) -> ComicDocument {
    ComicDocument {
        title: story.title.clone(),
        panels: sentences
            .iter()
            .map(|s| Panel {
                image: s.image().map(|reference| resolve_image(working_dir, reference)),
                caption: s.corrected_text.clone(),
            })
            .collect(),
    }
}

/// First sentence image, if any sentence has one
pub fn select_thumbnail(sentences: &[Sentence]) -> Option<String> {
    sentences.iter().find_map(|s| s.image()).map(str::to_string)
}

/// Image references are relative to the working directory unless absolute
pub fn resolve_image(working_dir: &Path, reference: &str) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

/// Write via a temporary sibling and rename, so readers never see a partial file
async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let tmp = path.with_extension("partial");
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::Io(e));
    }

    Ok(())
}
