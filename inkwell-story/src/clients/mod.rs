//! Enrichment service clients
//!
//! Three narrow traits sit between the pipeline and the outside world so the
//! coordinator, assembler and analysis generator can be driven by mocks in
//! tests. Every call may fail or time out; none are retried here.

pub mod ollama;
pub mod stable_diffusion;

pub use ollama::OllamaClient;
pub use stable_diffusion::StableDiffusionClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text generation service errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Service reported error: {0}")]
    Service(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from text generation service")]
    EmptyResponse,
}

/// Image generation service errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image API token is not configured")]
    MissingToken,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Unexpected content type {content_type}: {body}")]
    NotAnImage { content_type: String, body: String },

    #[error("Failed to store image: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<LlmError> for inkwell_common::Error {
    fn from(err: LlmError) -> Self {
        inkwell_common::Error::Upstream(err.to_string())
    }
}

impl From<ImageError> for inkwell_common::Error {
    fn from(err: ImageError) -> Self {
        inkwell_common::Error::Upstream(err.to_string())
    }
}

/// Corrected sentence plus a short note for the writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub corrected: String,
    pub feedback: String,
}

/// Structured critique of a finished story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryCritique {
    pub analysis: String,
    pub tips: Vec<String>,
    pub performance_score: i64,
}

/// Grammar/style correction of one sentence
#[async_trait]
pub trait TextCorrector: Send + Sync {
    async fn correct(&self, text: &str) -> Result<Correction, LlmError>;
}

/// Illustration of one scene description
///
/// Returns a reference to the stored image (relative to the working
/// directory, or absolute).
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ImageError>;

    /// Drop an image returned by [`ImageGenerator::generate`] that ended up
    /// unused; no-op unless the generator stores images itself
    async fn discard(&self, _reference: &str) -> Result<(), ImageError> {
        Ok(())
    }
}

/// Narrative critique of a whole story
#[async_trait]
pub trait StoryCritic: Send + Sync {
    async fn critique(&self, content: &str) -> Result<StoryCritique, LlmError>;
}
