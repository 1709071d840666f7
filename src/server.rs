//! JSON HTTP API.
//!
//! Exposes the record store and the capture pipeline to a presentation
//! layer (mobile app, web page, scripts). A scan that hits a duplicate name
//! is parked under a `capture_id` until the client posts a decision.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/contacts?q=` | List contacts, newest first, optionally filtered |
//! | `GET`    | `/contacts/{id}` | One contact |
//! | `PUT`    | `/contacts/{id}` | Edit fields (partial JSON) |
//! | `DELETE` | `/contacts/{id}` | Delete (204 even when absent) |
//! | `POST`   | `/contacts/{id}/rotate` | Rotate 90° clockwise and save |
//! | `GET`    | `/contacts/{id}/image` | Stored card image bytes |
//! | `POST`   | `/captures` | Raw photo body; 201 saved or 202 duplicate pending |
//! | `POST`   | `/captures/{capture_id}` | `{"decision": "save" \| "cancel"}`; stays pending if the save fails |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "contact not found: 12" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `extraction_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser-based
//! client can call the API directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use cardkeep_core::filter::filter_contacts;
use cardkeep_core::models::{ContactEdit, ContactRecord, Rotation};
use cardkeep_core::store::ContactStore;

use crate::config::Config;
use crate::contacts::{decode_image, edit_contact, open_store, rotate_contact};
use crate::crop::sniff_mime;
use crate::extractor::{create_extractor, FieldExtractor};
use crate::pipeline::{
    CaptureError, CaptureOutcome, CapturePipeline, DuplicateDecision, PendingCapture, Photo,
    ResumeOutcome, SavedContact,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<CapturePipeline>,
    /// Scans waiting for a duplicate decision. No expiry.
    pending: Arc<Mutex<HashMap<Uuid, PendingCapture>>>,
}

impl AppState {
    fn store(&self) -> &Arc<dyn ContactStore> {
        self.pipeline.store()
    }
}

/// Starts the HTTP server with the configured SQLite store and extractor.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let extractor = create_extractor(&config.extractor)?;
    run_server_with(config, Arc::new(store), Arc::from(extractor)).await
}

/// Starts the HTTP server over an explicit store and extractor.
pub async fn run_server_with(
    config: &Config,
    store: Arc<dyn ContactStore>,
    extractor: Arc<dyn FieldExtractor>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(config, store, extractor);

    info!(extractor_enabled = config.extractor.is_enabled(), "starting HTTP API");
    println!("Cardkeep API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed for embedding in other servers.
pub fn router(
    config: &Config,
    store: Arc<dyn ContactStore>,
    extractor: Arc<dyn FieldExtractor>,
) -> Router {
    let state = AppState {
        pipeline: Arc::new(CapturePipeline::new(
            store,
            extractor,
            config.capture.clone(),
        )),
        pending: Arc::new(Mutex::new(HashMap::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/contacts", get(handle_list))
        .route(
            "/contacts/{id}",
            get(handle_get).put(handle_update).delete(handle_delete),
        )
        .route("/contacts/{id}/rotate", post(handle_rotate))
        .route("/contacts/{id}/image", get(handle_image))
        .route("/captures", post(handle_capture))
        .route("/captures/{capture_id}", post(handle_decision))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!("request failed: {err:#}");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{err:#}"),
    }
}

/// Map store errors raised by shared helpers onto HTTP statuses.
fn classify(err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("not found") {
        not_found(msg)
    } else if msg.contains("must not be empty") {
        bad_request(msg)
    } else {
        internal(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Capture(msg) => bad_request(msg),
            CaptureError::Extraction(e) => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "extraction_failed",
                message: e.to_string(),
            },
            other => internal(anyhow::Error::new(other)),
        }
    }
}

// ============ Views ============

/// A contact as returned by the API: image bytes are fetched separately.
#[derive(Serialize)]
struct ContactView {
    id: i64,
    name: String,
    title: String,
    company: String,
    phone: String,
    mobile_phone: String,
    email: String,
    address: String,
    website: String,
    suggested_rotation: Rotation,
    has_image: bool,
    created_at: DateTime<Utc>,
}

impl From<&ContactRecord> for ContactView {
    fn from(r: &ContactRecord) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            title: r.title.clone(),
            company: r.company.clone(),
            phone: r.phone.clone(),
            mobile_phone: r.mobile_phone.clone(),
            email: r.email.clone(),
            address: r.address.clone(),
            website: r.website.clone(),
            suggested_rotation: r.suggested_rotation,
            has_image: r.image_data.is_some(),
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CaptureResponse {
    Saved { id: i64, name: String },
    Duplicate { capture_id: Uuid, name: String },
    Cancelled,
}

fn saved(contact: SavedContact) -> (StatusCode, Json<CaptureResponse>) {
    (
        StatusCode::CREATED,
        Json(CaptureResponse::Saved {
            id: contact.id,
            name: contact.name,
        }),
    )
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Contacts ============

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    q: String,
}

async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ContactView>>, AppError> {
    let records = state.store().list_all().await.map_err(internal)?;
    let views = filter_contacts(&records, &query.q)
        .into_iter()
        .map(ContactView::from)
        .collect();
    Ok(Json(views))
}

async fn load(state: &AppState, id: i64) -> Result<ContactRecord, AppError> {
    state
        .store()
        .get(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("contact not found: {}", id)))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ContactView>, AppError> {
    let record = load(&state, id).await?;
    Ok(Json(ContactView::from(&record)))
}

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ContactEdit>, JsonRejection>,
) -> Result<Json<ContactView>, AppError> {
    let Json(edit) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let record = edit_contact(state.store().as_ref(), id, edit)
        .await
        .map_err(classify)?;
    Ok(Json(ContactView::from(&record)))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store().delete(id).await.map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_rotate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ContactView>, AppError> {
    let record = rotate_contact(state.store().as_ref(), id)
        .await
        .map_err(classify)?;
    Ok(Json(ContactView::from(&record)))
}

async fn handle_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let record = load(&state, id).await?;
    let bytes = decode_image(&record)
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("contact {} has no image", id)))?;
    Ok(([(header::CONTENT_TYPE, sniff_mime(&bytes))], bytes).into_response())
}

// ============ Captures ============

async fn handle_capture(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CaptureResponse>), AppError> {
    let outcome = state
        .pipeline
        .run_capture(Photo::new(body.to_vec()))
        .await?;

    match outcome {
        CaptureOutcome::Saved(contact) => Ok(saved(contact)),
        CaptureOutcome::DuplicateFound(pending) => {
            let capture_id = Uuid::new_v4();
            let name = pending.name().to_string();
            state
                .pending
                .lock()
                .map_err(|_| internal(anyhow::anyhow!("pending capture map poisoned")))?
                .insert(capture_id, pending);
            Ok((
                StatusCode::ACCEPTED,
                Json(CaptureResponse::Duplicate { capture_id, name }),
            ))
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Decision {
    Save,
    Cancel,
}

#[derive(Deserialize)]
struct DecisionRequest {
    decision: Decision,
}

async fn handle_decision(
    State(state): State<AppState>,
    Path(capture_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<(StatusCode, Json<CaptureResponse>), AppError> {
    let pending = state
        .pending
        .lock()
        .map_err(|_| internal(anyhow::anyhow!("pending capture map poisoned")))?
        .remove(&capture_id)
        .ok_or_else(|| not_found(format!("no pending capture: {}", capture_id)))?;

    let decision = match request.decision {
        Decision::Save => DuplicateDecision::SaveAnyway,
        Decision::Cancel => DuplicateDecision::Cancel,
    };

    // Kept so a failed save can be retried under the same id.
    let retained = pending.clone();
    match state.pipeline.resume(pending, decision).await {
        Ok(ResumeOutcome::Saved(contact)) => Ok(saved(contact)),
        Ok(ResumeOutcome::Cancelled) => Ok((StatusCode::OK, Json(CaptureResponse::Cancelled))),
        Err(err) => {
            if let Ok(mut map) = state.pending.lock() {
                map.insert(capture_id, retained);
            }
            Err(err.into())
        }
    }
}
