//! Stable Diffusion image generation client
//!
//! Posts `{ "inputs": prompt }` to a hosted inference endpoint with a bearer
//! token and stores the returned image bytes under `<working_dir>/storyImages`.

use super::{ImageError, ImageGenerator};
use async_trait::async_trait;
use inkwell_common::config::ImageConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const USER_AGENT: &str = "inkwell/0.1.0";

/// Directory under the working directory that holds generated images
pub const IMAGES_SUBDIR: &str = "storyImages";

/// Disambiguates file names of images stored within the same clock tick
static IMAGE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// Hosted Stable Diffusion client
pub struct StableDiffusionClient {
    http_client: reqwest::Client,
    api_url: String,
    token: String,
    working_dir: PathBuf,
}

impl StableDiffusionClient {
    pub fn new(
        api_url: String,
        token: String,
        working_dir: PathBuf,
        timeout: Duration,
    ) -> Result<Self, ImageError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ImageError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url,
            token,
            working_dir,
        })
    }

    pub fn from_config(config: &ImageConfig, working_dir: PathBuf) -> Result<Self, ImageError> {
        Self::new(
            config.api_url.clone(),
            config.token.clone(),
            working_dir,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, ImageError> {
        let dir = self.working_dir.join(IMAGES_SUBDIR);
        tokio::fs::create_dir_all(&dir).await?;

        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        let seq = IMAGE_SEQ.fetch_add(1, Ordering::Relaxed);
        let file_name = format!("storyImage_{}_{}.{}", nanos, seq, extension);
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        Ok(format!("{}/{}", IMAGES_SUBDIR, file_name))
    }
}

#[async_trait]
impl ImageGenerator for StableDiffusionClient {
    async fn generate(&self, prompt: &str) -> Result<String, ImageError> {
        if !self.has_token() {
            return Err(ImageError::MissingToken);
        }

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&InferenceRequest { inputs: prompt })
            .send()
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ImageError::Api(
                status.as_u16(),
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }

        if !content_type.starts_with("image/") {
            return Err(ImageError::NotAnImage {
                content_type,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let extension = if content_type.contains("jpeg") || content_type.contains("jpg") {
            "jpg"
        } else {
            "png"
        };

        let path = self.store(&bytes, extension).await?;
        tracing::debug!(path = %path, size = bytes.len(), "Stored generated image");
        Ok(path)
    }

    async fn discard(&self, reference: &str) -> Result<(), ImageError> {
        // Only files this client stored under its own directory
        let Some(file_name) = reference.strip_prefix(&format!("{}/", IMAGES_SUBDIR)) else {
            return Ok(());
        };
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.contains("..") {
            return Ok(());
        }

        let path = self.working_dir.join(IMAGES_SUBDIR).join(file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Discarded unused image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
