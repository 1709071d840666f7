//! Card capture pipeline.
//!
//! One scan is: photo → fixed-ratio crop → extraction → duplicate check →
//! persist. The duplicate check is the only user decision point. Instead of
//! blocking on a dialog, [`CapturePipeline::run_capture`] returns
//! [`CaptureOutcome::DuplicateFound`] with a [`PendingCapture`] that owns
//! everything needed to finish, and [`CapturePipeline::resume`] takes the
//! user's [`DuplicateDecision`]. Nothing is held inside the pipeline
//! between the two calls, so a pending capture can wait indefinitely.
//!
//! ```text
//! photo ─▶ crop ─▶ extract ─▶ exists_by_name?
//!            │ (fallback:       │ no ──────────────▶ create ─▶ Saved
//!            │  original)       │ yes ─▶ DuplicateFound
//!                                          │ resume(SaveAnyway) ─▶ create ─▶ Saved
//!                                          │ resume(Cancel) ─────────────▶ Cancelled
//! ```
//!
//! | Failure | Result |
//! |---------|--------|
//! | empty photo | [`CaptureError::Capture`], no write |
//! | crop failure (decode, encode, or the blocking task) | logged, original photo used |
//! | extraction failure | [`CaptureError::Extraction`], no write |
//! | duplicate check failure | [`CaptureError::Lookup`], no write |
//! | create failure | [`CaptureError::Save`] |

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use thiserror::Error;
use tracing::{info, warn};

use cardkeep_core::models::NewContact;
use cardkeep_core::store::ContactStore;

use crate::config::{CaptureConfig, ExtractSource};
use crate::crop::crop_card;
use crate::extractor::{ExtractionError, FieldExtractor};

/// One captured still image, as encoded bytes.
#[derive(Debug, Clone)]
pub struct Photo {
    pub bytes: Vec<u8>,
}

impl Photo {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_path(path: &Path) -> Result<Self, CaptureError> {
        std::fs::read(path)
            .map(Self::new)
            .map_err(|e| CaptureError::Capture(format!("cannot read {}: {e}", path.display())))
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture failed: {0}")]
    Capture(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("duplicate check failed: {0:#}")]
    Lookup(anyhow::Error),
    #[error("failed to save contact: {0:#}")]
    Save(anyhow::Error),
}

/// A newly stored contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedContact {
    pub id: i64,
    pub name: String,
}

/// A scan paused on a duplicate-name warning.
#[derive(Debug, Clone)]
pub struct PendingCapture {
    draft: NewContact,
}

impl PendingCapture {
    /// The extracted name that matched an existing record.
    pub fn name(&self) -> &str {
        &self.draft.name
    }

    pub fn draft(&self) -> &NewContact {
        &self.draft
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateDecision {
    SaveAnyway,
    Cancel,
}

#[derive(Debug)]
pub enum CaptureOutcome {
    Saved(SavedContact),
    DuplicateFound(PendingCapture),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Saved(SavedContact),
    /// The user chose not to save. Not an error.
    Cancelled,
}

/// Orchestrates scan-to-record transactions against a store and an extractor.
pub struct CapturePipeline {
    store: Arc<dyn ContactStore>,
    extractor: Arc<dyn FieldExtractor>,
    settings: CaptureConfig,
}

impl CapturePipeline {
    pub fn new(
        store: Arc<dyn ContactStore>,
        extractor: Arc<dyn FieldExtractor>,
        settings: CaptureConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ContactStore> {
        &self.store
    }

    /// Run one scan up to either a saved record or a duplicate warning.
    pub async fn run_capture(&self, photo: Photo) -> Result<CaptureOutcome, CaptureError> {
        if photo.bytes.is_empty() {
            return Err(CaptureError::Capture("photo is empty".to_string()));
        }

        let bytes = photo.bytes.clone();
        let settings = self.settings.clone();
        let cropped = tokio::task::spawn_blocking(move || crop_card(&bytes, &settings)).await;

        let card_image = match cropped {
            Ok(Ok(cropped)) => {
                info!(
                    source = %format!("{}x{}", cropped.source_width, cropped.source_height),
                    crop = %format!("{}x{}", cropped.rect.width, cropped.rect.height),
                    "cropped card image"
                );
                cropped.jpeg
            }
            Ok(Err(err)) => {
                warn!("fixed crop failed, keeping original photo: {err:#}");
                photo.bytes.clone()
            }
            Err(err) => {
                warn!("crop task failed, keeping original photo: {err}");
                photo.bytes.clone()
            }
        };

        let extraction_input = match self.settings.extract_from {
            ExtractSource::Cropped => &card_image,
            ExtractSource::Original => &photo.bytes,
        };

        let fields = self.extractor.extract(extraction_input).await?;
        info!(name = %fields.name, extractor = self.extractor.name(), "extracted card fields");

        let image_data = base64::engine::general_purpose::STANDARD.encode(&card_image);
        let draft = NewContact::from_extracted(fields, Some(image_data));

        let duplicate = self
            .store
            .exists_by_name(&draft.name)
            .await
            .map_err(CaptureError::Lookup)?;

        if duplicate {
            info!(name = %draft.name, "contact with this name already exists, awaiting decision");
            return Ok(CaptureOutcome::DuplicateFound(PendingCapture { draft }));
        }

        self.save(draft).await.map(CaptureOutcome::Saved)
    }

    /// Finish a scan paused on a duplicate warning.
    pub async fn resume(
        &self,
        pending: PendingCapture,
        decision: DuplicateDecision,
    ) -> Result<ResumeOutcome, CaptureError> {
        match decision {
            DuplicateDecision::Cancel => {
                info!(name = %pending.name(), "duplicate capture cancelled");
                Ok(ResumeOutcome::Cancelled)
            }
            DuplicateDecision::SaveAnyway => {
                self.save(pending.draft).await.map(ResumeOutcome::Saved)
            }
        }
    }

    async fn save(&self, draft: NewContact) -> Result<SavedContact, CaptureError> {
        let id = self.store.create(&draft).await.map_err(CaptureError::Save)?;
        info!(id, name = %draft.name, "saved contact");
        Ok(SavedContact {
            id,
            name: draft.name,
        })
    }
}
