//! Bootstrap configuration loading
//!
//! Settings are resolved in this order:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (`INKWELL_HF_TOKEN`, `INKWELL_LLM_URL`)
//! 3. TOML config file
//! 4. Built-in defaults
//!
//! A missing TOML file is not fatal: a warning is logged and defaults are used.
//! A TOML file that exists but does not parse is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "INKWELL_CONFIG";
/// Environment variable overriding `image.token`
pub const HF_TOKEN_ENV: &str = "INKWELL_HF_TOKEN";
/// Environment variable overriding `llm.url`
pub const LLM_URL_ENV: &str = "INKWELL_LLM_URL";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime; restart to pick up changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to SQLite database file (relative or absolute)
    pub database_path: PathBuf,

    pub host: String,

    /// HTTP server port
    pub port: u16,

    /// Root of generated artifacts: `comics/` and `storyImages/` live here
    pub working_dir: PathBuf,

    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub image: ImageConfig,
    pub sweeps: SweepConfig,
    pub events: EventConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,
}

/// Text generation service (sentence correction and story analysis)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// Generate endpoint, e.g. `http://localhost:11434/api/generate`
    pub url: String,
    pub model: String,
    /// Per-request timeout; long, model inference is slow
    pub timeout_secs: u64,
}

/// Image generation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    pub api_url: String,
    /// Bearer token; empty disables image generation (every call fails fast)
    pub token: String,
    pub timeout_secs: u64,
}

/// Reconciliation sweep scheduling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    pub run_on_startup: bool,
    /// Re-run both sweeps on this period; `None` runs them at startup only
    pub interval_secs: Option<u64>,
    /// Age after which another producer may take over an artifact claim
    pub claim_lease_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventConfig {
    /// Buffer of the observer (SSE) feed
    pub capacity: usize,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("inkwell.db"),
            host: "127.0.0.1".to_string(),
            port: 5730,
            working_dir: PathBuf::from("working"),
            logging: LoggingConfig::default(),
            llm: LlmConfig::default(),
            image: ImageConfig::default(),
            sweeps: SweepConfig::default(),
            events: EventConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "mistral".to_string(),
            timeout_secs: 600,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-2"
                .to_string(),
            token: String::new(),
            timeout_secs: 600,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            run_on_startup: true,
            interval_secs: None,
            claim_lease_secs: 1800,
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

impl TomlConfig {
    /// Directory holding rendered comic documents
    pub fn comics_dir(&self) -> PathBuf {
        self.working_dir.join("comics")
    }

    /// Directory holding generated sentence images
    pub fn images_dir(&self) -> PathBuf {
        self.working_dir.join("storyImages")
    }

    /// Overlay environment variables on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(HF_TOKEN_ENV) {
            if !token.trim().is_empty() {
                info!("Image API token loaded from environment variable");
                self.image.token = token;
            }
        }
        if let Ok(url) = std::env::var(LLM_URL_ENV) {
            if !url.trim().is_empty() {
                info!(url = %url, "LLM endpoint overridden by environment variable");
                self.llm.url = url;
            }
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate the config file: explicit argument, then `INKWELL_CONFIG`, then
/// `./inkwell.toml`, then `<config dir>/inkwell/inkwell.toml`
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = PathBuf::from("inkwell.toml");
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|d| d.join("inkwell").join("inkwell.toml"))
        .filter(|p| p.exists())
}

/// Load configuration with graceful degradation
///
/// Missing file → warning + defaults. Unparseable file → error.
/// Environment overrides are applied in both cases.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        Some(path) => {
            warn!("Config file {} not found, using defaults", path.display());
            TomlConfig::default()
        }
        None => {
            warn!("No config file found, using defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    Ok(config)
}
