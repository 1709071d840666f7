//! Capture pipeline end to end over the in-memory store.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use cardkeep::config::{CaptureConfig, ExtractSource};
use cardkeep::crop::encode_png;
use cardkeep::extractor::{ExtractionError, FieldExtractor};
use cardkeep::pipeline::{
    CaptureError, CaptureOutcome, CapturePipeline, DuplicateDecision, Photo, ResumeOutcome,
};
use cardkeep_core::models::{ContactRecord, ExtractedFields, NewContact, Rotation};
use cardkeep_core::store::memory::InMemoryStore;
use cardkeep_core::store::ContactStore;
use image::{Rgb, RgbImage};

// ─── Test doubles ───────────────────────────────────────────────────

/// Returns fixed fields and remembers every image it was shown.
struct ScriptedExtractor {
    fields: Option<ExtractedFields>,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedExtractor {
    fn returning(name: &str) -> Self {
        Self {
            fields: Some(ExtractedFields {
                name: name.to_string(),
                company: "Acme".to_string(),
                suggested_rotation: Rotation::Half,
                ..Default::default()
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fields: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<Vec<u8>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl FieldExtractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, image: &[u8]) -> Result<ExtractedFields, ExtractionError> {
        self.seen.lock().unwrap().push(image.to_vec());
        self.fields.clone().ok_or(ExtractionError::EmptyResponse)
    }
}

/// Store whose duplicate check always fails.
struct BrokenLookupStore(InMemoryStore);

#[async_trait]
impl ContactStore for BrokenLookupStore {
    async fn initialize(&self) -> Result<()> {
        self.0.initialize().await
    }
    async fn create(&self, contact: &NewContact) -> Result<i64> {
        self.0.create(contact).await
    }
    async fn update(&self, contact: &ContactRecord) -> Result<bool> {
        self.0.update(contact).await
    }
    async fn list_all(&self) -> Result<Vec<ContactRecord>> {
        self.0.list_all().await
    }
    async fn get(&self, id: i64) -> Result<Option<ContactRecord>> {
        self.0.get(id).await
    }
    async fn exists_by_name(&self, _name: &str) -> Result<bool> {
        anyhow::bail!("database is locked")
    }
    async fn delete(&self, id: i64) -> Result<bool> {
        self.0.delete(id).await
    }
}

/// Store that can look names up but never write.
struct BrokenCreateStore(InMemoryStore);

#[async_trait]
impl ContactStore for BrokenCreateStore {
    async fn initialize(&self) -> Result<()> {
        self.0.initialize().await
    }
    async fn create(&self, _contact: &NewContact) -> Result<i64> {
        anyhow::bail!("disk full")
    }
    async fn update(&self, contact: &ContactRecord) -> Result<bool> {
        self.0.update(contact).await
    }
    async fn list_all(&self) -> Result<Vec<ContactRecord>> {
        self.0.list_all().await
    }
    async fn get(&self, id: i64) -> Result<Option<ContactRecord>> {
        self.0.get(id).await
    }
    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        self.0.exists_by_name(name).await
    }
    async fn delete(&self, id: i64) -> Result<bool> {
        self.0.delete(id).await
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn card_photo(width: u32, height: u32) -> Photo {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    Photo::new(encode_png(&img).unwrap())
}

fn pipeline(
    store: Arc<InMemoryStore>,
    extractor: Arc<ScriptedExtractor>,
    settings: CaptureConfig,
) -> CapturePipeline {
    CapturePipeline::new(store, extractor, settings)
}

fn decode_stored(record: &ContactRecord) -> image::DynamicImage {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(record.image_data.as_ref().unwrap())
        .unwrap();
    image::load_from_memory(&bytes).unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_name_is_saved_with_cropped_image() {
    let store = Arc::new(InMemoryStore::new());
    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let pipeline = pipeline(store.clone(), extractor.clone(), CaptureConfig::default());

    let outcome = pipeline.run_capture(card_photo(1000, 1000)).await.unwrap();
    let saved = match outcome {
        CaptureOutcome::Saved(saved) => saved,
        other => panic!("expected Saved, got {:?}", other),
    };
    assert_eq!(saved.name, "Jane Doe");
    assert_eq!(store.create_calls(), 1);

    let record = store.get(saved.id).await.unwrap().unwrap();
    assert_eq!(record.company, "Acme");
    assert_eq!(record.suggested_rotation, Rotation::Half);

    let stored = decode_stored(&record);
    assert_eq!((stored.width(), stored.height()), (850, 532));

    // The extractor saw the same crop that was stored.
    let seen = extractor.seen();
    assert_eq!(seen.len(), 1);
    let base64 = base64::engine::general_purpose::STANDARD.encode(&seen[0]);
    assert_eq!(record.image_data.as_deref(), Some(base64.as_str()));
}

#[tokio::test]
async fn test_extract_from_original_photo() {
    let store = Arc::new(InMemoryStore::new());
    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let settings = CaptureConfig {
        extract_from: ExtractSource::Original,
        ..Default::default()
    };
    let pipeline = pipeline(store.clone(), extractor.clone(), settings);

    let photo = card_photo(1000, 1000);
    let original = photo.bytes.clone();
    pipeline.run_capture(photo).await.unwrap();

    assert_eq!(extractor.seen(), vec![original]);
    let record = store.list_all().await.unwrap().remove(0);
    assert_eq!(decode_stored(&record).width(), 850);
}

#[tokio::test]
async fn test_duplicate_then_cancel_writes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let pipeline = pipeline(store.clone(), extractor, CaptureConfig::default());

    pipeline.run_capture(card_photo(400, 300)).await.unwrap();
    assert_eq!(store.create_calls(), 1);

    let pending = match pipeline.run_capture(card_photo(400, 300)).await.unwrap() {
        CaptureOutcome::DuplicateFound(pending) => pending,
        other => panic!("expected DuplicateFound, got {:?}", other),
    };
    assert_eq!(pending.name(), "Jane Doe");
    assert_eq!(pending.draft().company, "Acme");
    assert!(pending.draft().image_data.is_some());
    assert_eq!(store.create_calls(), 1);

    let resumed = pipeline
        .resume(pending, DuplicateDecision::Cancel)
        .await
        .unwrap();
    assert_eq!(resumed, ResumeOutcome::Cancelled);
    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_then_save_anyway() {
    let store = Arc::new(InMemoryStore::new());
    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let pipeline = pipeline(store.clone(), extractor, CaptureConfig::default());

    pipeline.run_capture(card_photo(400, 300)).await.unwrap();
    let CaptureOutcome::DuplicateFound(pending) =
        pipeline.run_capture(card_photo(400, 300)).await.unwrap()
    else {
        panic!("expected DuplicateFound");
    };

    let ResumeOutcome::Saved(saved) = pipeline
        .resume(pending, DuplicateDecision::SaveAnyway)
        .await
        .unwrap()
    else {
        panic!("expected Saved");
    };

    assert_eq!(store.create_calls(), 2);
    let records = store.list_all().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.name == "Jane Doe"));
    assert_eq!(records[0].id, saved.id);
    assert!(records[0].image_data.is_some());
}

#[tokio::test]
async fn test_undecodable_photo_falls_back_to_original() {
    let store = Arc::new(InMemoryStore::new());
    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let pipeline = pipeline(store.clone(), extractor.clone(), CaptureConfig::default());

    let raw = b"not really an image".to_vec();
    pipeline.run_capture(Photo::new(raw.clone())).await.unwrap();

    assert_eq!(extractor.seen(), vec![raw.clone()]);
    let record = store.list_all().await.unwrap().remove(0);
    assert_eq!(
        record.image_data,
        Some(base64::engine::general_purpose::STANDARD.encode(&raw))
    );
}

#[tokio::test]
async fn test_extraction_failure_writes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let extractor = Arc::new(ScriptedExtractor::failing());
    let pipeline = pipeline(store.clone(), extractor, CaptureConfig::default());

    let err = pipeline
        .run_capture(card_photo(400, 300))
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::Extraction(_)));
    assert_eq!(store.create_calls(), 0);
}

#[tokio::test]
async fn test_empty_photo_is_capture_error() {
    let store = Arc::new(InMemoryStore::new());
    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let pipeline = pipeline(store.clone(), extractor.clone(), CaptureConfig::default());

    let err = pipeline.run_capture(Photo::new(Vec::new())).await.unwrap_err();
    assert!(matches!(err, CaptureError::Capture(_)));
    assert!(extractor.seen().is_empty());
    assert_eq!(store.create_calls(), 0);
}

#[tokio::test]
async fn test_lookup_failure_aborts_before_save() {
    let store = Arc::new(BrokenLookupStore(InMemoryStore::new()));
    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let pipeline = CapturePipeline::new(store.clone(), extractor, CaptureConfig::default());

    let err = pipeline
        .run_capture(card_photo(400, 300))
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::Lookup(_)));
    assert!(err.to_string().contains("database is locked"));
    assert_eq!(store.0.create_calls(), 0);
}

#[tokio::test]
async fn test_create_failure_is_save_error() {
    let store = Arc::new(BrokenCreateStore(InMemoryStore::new()));
    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let pipeline = CapturePipeline::new(store.clone(), extractor, CaptureConfig::default());

    let err = pipeline
        .run_capture(card_photo(400, 300))
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::Save(_)), "got {:?}", err);
    assert!(err.to_string().contains("disk full"));
    assert!(store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_anyway_create_failure_is_save_error() {
    let store = Arc::new(BrokenCreateStore(InMemoryStore::new()));
    let existing = NewContact::from_extracted(
        ExtractedFields {
            name: "Jane Doe".to_string(),
            ..Default::default()
        },
        None,
    );
    store.0.create(&existing).await.unwrap();

    let extractor = Arc::new(ScriptedExtractor::returning("Jane Doe"));
    let pipeline = CapturePipeline::new(store.clone(), extractor, CaptureConfig::default());

    let CaptureOutcome::DuplicateFound(pending) =
        pipeline.run_capture(card_photo(400, 300)).await.unwrap()
    else {
        panic!("expected DuplicateFound");
    };

    let err = pipeline
        .resume(pending, DuplicateDecision::SaveAnyway)
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::Save(_)), "got {:?}", err);
    assert!(err.to_string().contains("disk full"));
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_photo_file() {
    let err = Photo::from_path(std::path::Path::new("/definitely/not/here.jpg")).unwrap_err();
    assert!(matches!(err, CaptureError::Capture(_)));
}
