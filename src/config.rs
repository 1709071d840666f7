//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/cards.sqlite"
//!
//! [extractor]
//! provider = "gemini"          # or "disabled"
//! model = "gemini-2.5-flash"
//! api_key_env = "GEMINI_API_KEY"
//!
//! [capture]
//! width_ratio = 0.85
//! aspect_ratio = 1.6
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! Every section except `[db]` may be omitted.

use anyhow::{Context, Result};
use cardkeep_core::geometry::{CARD_ASPECT_RATIO, DEFAULT_WIDTH_RATIO};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ExtractorConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

/// Which image the extractor is shown.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractSource {
    /// The crop-stage image (the same bytes that get stored).
    #[default]
    Cropped,
    /// The full camera frame.
    Original,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_width_ratio")]
    pub width_ratio: f64,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub extract_from: ExtractSource,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width_ratio: default_width_ratio(),
            aspect_ratio: default_aspect_ratio(),
            jpeg_quality: default_jpeg_quality(),
            extract_from: ExtractSource::default(),
        }
    }
}

fn default_width_ratio() -> f64 {
    DEFAULT_WIDTH_RATIO
}
fn default_aspect_ratio() -> f64 {
    CARD_ASPECT_RATIO
}
fn default_jpeg_quality() -> u8 {
    85
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Config {
    /// Defaults everywhere, database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/cards.sqlite"),
            },
            extractor: ExtractorConfig::default(),
            capture: CaptureConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let capture = &config.capture;
    if !(capture.width_ratio > 0.0 && capture.width_ratio <= 1.0) {
        anyhow::bail!("capture.width_ratio must be in (0.0, 1.0]");
    }
    if !(capture.aspect_ratio.is_finite() && capture.aspect_ratio > 0.0) {
        anyhow::bail!("capture.aspect_ratio must be a finite number > 0");
    }
    if !(1..=100).contains(&capture.jpeg_quality) {
        anyhow::bail!("capture.jpeg_quality must be in 1..=100");
    }

    match config.extractor.provider.as_str() {
        "disabled" => {}
        "gemini" => {
            if config.extractor.model.trim().is_empty() {
                anyhow::bail!("extractor.model must be set when provider is 'gemini'");
            }
        }
        other => anyhow::bail!(
            "Unknown extractor provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(())
}
