//! Shared test fixtures: throw-away database and working directory, mock
//! enrichment clients, and a fully wired pipeline.

#![allow(dead_code)]

use async_trait::async_trait;
use inkwell_common::db::init_database;
use inkwell_common::events::EventBus;
use inkwell_story::clients::{
    Correction, ImageError, ImageGenerator, LlmError, StoryCritic, StoryCritique, TextCorrector,
};
use inkwell_story::services::comic::{ComicDocument, ComicRenderer, PdfComicRenderer};
use inkwell_story::{AppState, Clients, Pipeline};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const MOCK_IMAGE: &str = "storyImages/mock.png";
pub const MOCK_FEEDBACK: &str = "Looks good.";
pub const CLAIM_LEASE_SECS: u64 = 1800;

/// Echoes the input back; fails for texts containing `fail_marker`, or all
/// texts when `fail_all` is set
#[derive(Default)]
pub struct MockCorrector {
    pub calls: AtomicUsize,
    pub fail_all: AtomicBool,
    pub fail_marker: Mutex<Option<String>>,
}

impl MockCorrector {
    pub fn fail_on(&self, marker: &str) {
        *self.fail_marker.lock().unwrap() = Some(marker.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextCorrector for MockCorrector {
    async fn correct(&self, text: &str) -> Result<Correction, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let marked = self
            .fail_marker
            .lock()
            .unwrap()
            .as_deref()
            .map(|m| text.contains(m))
            .unwrap_or(false);
        if marked || self.fail_all.load(Ordering::SeqCst) {
            return Err(LlmError::Network("mock correction failure".to_string()));
        }

        Ok(Correction {
            corrected: text.to_string(),
            feedback: MOCK_FEEDBACK.to_string(),
        })
    }
}

/// Returns [`MOCK_IMAGE`], which exists as a real PNG in the working dir
#[derive(Default)]
pub struct MockImages {
    pub calls: AtomicUsize,
    pub fail_all: AtomicBool,
}

impl MockImages {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for MockImages {
    async fn generate(&self, _prompt: &str) -> Result<String, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ImageError::Api(429, "mock quota exceeded".to_string()));
        }

        Ok(MOCK_IMAGE.to_string())
    }
}

/// Fixed critique; fails (as an unparseable reply) for content containing
/// `fail_marker`, or always when `fail_all` is set
#[derive(Default)]
pub struct MockCritic {
    pub calls: AtomicUsize,
    pub fail_all: AtomicBool,
    pub fail_marker: Mutex<Option<String>>,
}

impl MockCritic {
    pub fn fail_on(&self, marker: &str) {
        *self.fail_marker.lock().unwrap() = Some(marker.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoryCritic for MockCritic {
    async fn critique(&self, content: &str) -> Result<StoryCritique, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let marked = self
            .fail_marker
            .lock()
            .unwrap()
            .as_deref()
            .map(|m| content.contains(m))
            .unwrap_or(false);
        if marked || self.fail_all.load(Ordering::SeqCst) {
            return Err(LlmError::Parse("mock malformed reply".to_string()));
        }

        Ok(StoryCritique {
            analysis: format!("A story of {} characters.", content.len()),
            tips: vec![
                "Use more dialogue".to_string(),
                "Vary sentence length".to_string(),
            ],
            performance_score: 75,
        })
    }
}

/// Real PDF renderer that can be switched to failing, and counts panels
#[derive(Default)]
pub struct SwitchableRenderer {
    pub fail: AtomicBool,
    pub renders: AtomicUsize,
    pub last_panel_count: AtomicUsize,
    pub last_images: AtomicUsize,
}

impl ComicRenderer for SwitchableRenderer {
    fn render(&self, document: &ComicDocument) -> inkwell_common::Result<Vec<u8>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(inkwell_common::Error::Render("mock render failure".to_string()));
        }
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.last_panel_count
            .store(document.panels.len(), Ordering::SeqCst);
        self.last_images.store(
            document.panels.iter().filter(|p| p.image.is_some()).count(),
            Ordering::SeqCst,
        );
        PdfComicRenderer::new().render(document)
    }

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    pub db: SqlitePool,
    pub bus: EventBus,
    pub pipeline: Pipeline,
    pub corrector: Arc<MockCorrector>,
    pub images: Arc<MockImages>,
    pub critic: Arc<MockCritic>,
    pub renderer: Arc<SwitchableRenderer>,
}

impl TestEnv {
    /// Wired pipeline with subscribers registered
    pub async fn new() -> Self {
        let env = Self::without_subscribers().await;
        env.pipeline.register_subscribers(&env.bus);
        env
    }

    /// Wired pipeline whose `story_completed` events reach nobody
    pub async fn without_subscribers() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = init_database(&dir.path().join("test.db")).await.unwrap();
        write_mock_image(&dir.path().join(MOCK_IMAGE));

        let bus = EventBus::new(100);
        let corrector = Arc::new(MockCorrector::default());
        let images = Arc::new(MockImages::default());
        let critic = Arc::new(MockCritic::default());
        let renderer = Arc::new(SwitchableRenderer::default());

        let pipeline = Pipeline::new(
            db.clone(),
            &bus,
            Clients {
                corrector: corrector.clone(),
                images: images.clone(),
                critic: critic.clone(),
                renderer: renderer.clone(),
            },
            dir.path().to_path_buf(),
            CLAIM_LEASE_SECS,
        );

        Self {
            dir,
            db,
            bus,
            pipeline,
            corrector,
            images,
            critic,
            renderer,
        }
    }

    pub fn working_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn comic_path(&self, story_id: i64) -> PathBuf {
        self.dir
            .path()
            .join("comics")
            .join(format!("comic_{}.pdf", story_id))
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.db.clone(), self.bus.clone(), &self.pipeline)
    }

    /// Story with `sentences` added through the coordinator, then completed
    pub async fn completed_story(&self, user_id: i64, title: &str, sentences: &[&str]) -> i64 {
        let story = self.pipeline.stories.create_story(user_id, title).await.unwrap();
        for text in sentences {
            self.pipeline.stories.add_sentence(story.id, text).await.unwrap();
        }
        self.pipeline.stories.complete_story(story.id).await.unwrap();
        story.id
    }
}

fn write_mock_image(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_pixel(48, 27, image::Rgb([30, 90, 200]))
        .save(path)
        .unwrap();
}
