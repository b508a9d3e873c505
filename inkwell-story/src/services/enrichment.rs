//! Sentence Enrichment Coordinator
//!
//! One "add sentence" action fans out to the text corrector and the image
//! generator on two independent tasks, waits for both, and merges the two
//! results independently: a failure on one side never discards the other
//! side's success and never fails the call. Only persistence errors reach
//! the caller.

use chrono::Utc;
use inkwell_common::db::{NewSentence, Sentence};
use inkwell_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::clients::{Correction, ImageError, ImageGenerator, LlmError, TextCorrector};
use crate::db::{sentences, stories};

/// Feedback stored when the correction call fails
pub const FEEDBACK_FALLBACK: &str = "Could not generate feedback";

/// Scene prompt sent to the image generator for one sentence
pub fn illustration_prompt(sentence: &str) -> String {
    format!(
        "Comic-style illustration with bold outlines, vibrant colors, and dynamic poses. \
         Scene: {}. Expressive characters and engaging composition like a graphic novel. \
         Use strong lighting and shading for depth.",
        sentence
    )
}

/// Merged result of both enrichment branches
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub corrected_text: String,
    pub feedback: String,
    pub image_url: Option<String>,
}

/// Combine the two branch results, each with its own fallback
pub fn merge_enrichment(
    raw_text: &str,
    correction: std::result::Result<Correction, LlmError>,
    image: std::result::Result<String, ImageError>,
) -> Enrichment {
    let (corrected_text, feedback) = match correction {
        Ok(c) if !c.corrected.trim().is_empty() => (c.corrected, c.feedback),
        Ok(_) => {
            warn!("Correction returned empty text, keeping original");
            (raw_text.to_string(), FEEDBACK_FALLBACK.to_string())
        }
        Err(e) => {
            warn!(error = %e, "Sentence correction failed, keeping original");
            (raw_text.to_string(), FEEDBACK_FALLBACK.to_string())
        }
    };

    let image_url = match image {
        Ok(url) if !url.trim().is_empty() => Some(url),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Image generation failed, storing sentence without image");
            None
        }
    };

    Enrichment {
        corrected_text,
        feedback,
        image_url,
    }
}

/// Coordinates enrichment and persistence of new sentences
pub struct EnrichmentCoordinator {
    db: SqlitePool,
    corrector: Arc<dyn TextCorrector>,
    images: Arc<dyn ImageGenerator>,
}

impl EnrichmentCoordinator {
    pub fn new(
        db: SqlitePool,
        corrector: Arc<dyn TextCorrector>,
        images: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            db,
            corrector,
            images,
        }
    }

    /// Enrich and store one sentence of an `in_progress` story
    ///
    /// Latency is bounded by the slower of the two enrichment calls. Once
    /// dispatched, the calls run to completion (or their own timeout) even if
    /// the caller goes away.
    pub async fn add_sentence(&self, story_id: i64, raw_text: &str) -> Result<Sentence> {
        let raw_text = raw_text.trim();
        if raw_text.is_empty() {
            return Err(Error::InvalidInput("Sentence text is empty".to_string()));
        }

        let story = stories::get_story(&self.db, story_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Story {}", story_id)))?;
        if story.is_completed() {
            return Err(Error::InvalidState(format!(
                "Story {} is already completed",
                story_id
            )));
        }

        info!(story_id, "Enriching sentence");

        let correction_task = {
            let corrector = Arc::clone(&self.corrector);
            let text = raw_text.to_string();
            tokio::spawn(async move { corrector.correct(&text).await })
        };
        let image_task = {
            let images = Arc::clone(&self.images);
            let prompt = illustration_prompt(raw_text);
            tokio::spawn(async move { images.generate(&prompt).await })
        };

        let (correction, image) = tokio::join!(correction_task, image_task);

        let enrichment = merge_enrichment(
            raw_text,
            flatten_correction(correction),
            flatten_image(image),
        );

        let image_url = enrichment.image_url.clone();
        let inserted = sentences::insert_sentence(
            &self.db,
            &NewSentence {
                story_id,
                original_text: raw_text.to_string(),
                corrected_text: enrichment.corrected_text,
                feedback: enrichment.feedback,
                image_url: enrichment.image_url,
                created_at: Utc::now(),
            },
        )
        .await;

        let sentence = match inserted {
            Ok(sentence) => sentence,
            Err(e) => {
                // Nothing references the image now
                if let Some(url) = image_url {
                    if let Err(discard_err) = self.images.discard(&url).await {
                        warn!(
                            story_id,
                            image = %url,
                            error = %discard_err,
                            "Failed to discard unused image"
                        );
                    }
                }
                return Err(e);
            }
        };

        info!(
            story_id,
            sentence_id = sentence.id,
            has_image = sentence.image_url.is_some(),
            "Sentence stored"
        );

        Ok(sentence)
    }
}

fn flatten_correction(
    joined: std::result::Result<std::result::Result<Correction, LlmError>, JoinError>,
) -> std::result::Result<Correction, LlmError> {
    joined.unwrap_or_else(|e| Err(LlmError::Network(format!("correction task aborted: {}", e))))
}

fn flatten_image(
    joined: std::result::Result<std::result::Result<String, ImageError>, JoinError>,
) -> std::result::Result<String, ImageError> {
    joined.unwrap_or_else(|e| Err(ImageError::Network(format!("image task aborted: {}", e))))
}
