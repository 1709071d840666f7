//! Field extraction backends.
//!
//! Defines the [`FieldExtractor`] trait (one photographed card in,
//! [`ExtractedFields`] out) and its implementations:
//! - **[`DisabledExtractor`]**: always fails; used when no backend is configured.
//! - **[`GeminiExtractor`]**: sends the fixed prompt plus the image to the
//!   Gemini `generateContent` endpoint.
//!
//! Reply text is handed to [`cardkeep_core::reply::parse_reply`], which
//! strips markdown fences and validates the shape. There is no retry: a
//! failed extraction is reported once and the user decides whether to scan
//! again.
//!
//! # Backend Selection
//!
//! ```rust,no_run
//! # use cardkeep::config::ExtractorConfig;
//! # use cardkeep::extractor::create_extractor;
//! let config = ExtractorConfig::default(); // provider = "disabled"
//! let extractor = create_extractor(&config).unwrap();
//! assert_eq!(extractor.name(), "disabled");
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use cardkeep_core::models::ExtractedFields;
use cardkeep_core::reply::{parse_reply, ReplyError};

use crate::config::ExtractorConfig;
use crate::crop::sniff_mime;

/// Instruction sent with every card image.
pub const EXTRACTION_PROMPT: &str = r#"
You are an expert Business Card Scanner.

Task 1: Detect Rotation.
Identify the clockwise rotation needed for the business card text to be upright (0, 90, 180, 270).

Task 2: Extract Information.
Read the text and extract:
- name, title, company, phone (office), mobile_phone, email, address, website.
- Use Traditional Chinese (繁體中文) for Taiwan addresses/names.

Return a single JSON object:
{
  "suggested_rotation": int,
  "name": "string",
  "title": "string",
  "company": "string",
  "phone": "string",
  "mobile_phone": "string",
  "email": "string",
  "address": "string",
  "website": "string"
}
"#;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extractor disabled: set [extractor] provider in the config")]
    Disabled,
    #[error("extractor misconfigured: {0}")]
    Config(String),
    #[error("extraction request timed out")]
    Timeout,
    #[error("extraction request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("inference service returned {status}: {body}")]
    Service { status: u16, body: String },
    #[error("inference service reply had no text")]
    EmptyResponse,
    #[error("could not parse extraction reply: {0}")]
    Reply(#[from] ReplyError),
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExtractionError::Timeout
        } else {
            ExtractionError::Transport(err)
        }
    }
}

/// A backend that reads contact fields off a card image.
///
/// Swapping the backend never touches the capture pipeline.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    /// Backend identifier (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// Extract fields from one encoded image. Never returns a partial result.
    async fn extract(&self, image: &[u8]) -> Result<ExtractedFields, ExtractionError>;
}

/// Build the backend named by `config.provider`.
pub fn create_extractor(
    config: &ExtractorConfig,
) -> Result<Box<dyn FieldExtractor>, ExtractionError> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledExtractor)),
        "gemini" => Ok(Box::new(GeminiExtractor::new(config)?)),
        other => Err(ExtractionError::Config(format!(
            "unknown extractor provider '{other}'"
        ))),
    }
}

// ============ Disabled ============

/// Used when `extractor.provider = "disabled"`.
pub struct DisabledExtractor;

#[async_trait]
impl FieldExtractor for DisabledExtractor {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn extract(&self, _image: &[u8]) -> Result<ExtractedFields, ExtractionError> {
        Err(ExtractionError::Disabled)
    }
}

// ============ Gemini ============

/// Extractor backed by the Gemini `generateContent` API.
///
/// The API key is read from the environment variable named by
/// `extractor.api_key_env` (default `GEMINI_API_KEY`).
pub struct GeminiExtractor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractionError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ExtractionError::Config(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &ExtractorConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Request body: the prompt followed by the inline image.
pub fn build_request(image: &[u8]) -> Value {
    let data = base64::engine::general_purpose::STANDARD.encode(image);
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": EXTRACTION_PROMPT },
                { "inline_data": { "mime_type": sniff_mime(image), "data": data } }
            ]
        }]
    })
}

/// Concatenate the text parts of the first candidate.
fn reply_text(json: &Value) -> Option<String> {
    let parts = json
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl FieldExtractor for GeminiExtractor {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, image: &[u8]) -> Result<ExtractedFields, ExtractionError> {
        debug!(model = %self.model, bytes = image.len(), "sending extraction request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response.json().await?;
        let text = reply_text(&json).ok_or(ExtractionError::EmptyResponse)?;
        debug!(chars = text.len(), "received extraction reply");

        Ok(parse_reply(&text)?)
    }
}
