//! HTTP API server.
//!
//! Exposes the content collections and the recycle bin as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/api/recycle-bin` | List archived entries, newest first |
//! | `POST`   | `/api/recycle-bin/restore/{id}` | Restore an entry under a fresh id |
//! | `DELETE` | `/api/recycle-bin/{id}` | Purge an entry and its hosted images |
//! | `GET`    | `/api/{route}` | List a collection |
//! | `POST`   | `/api/{route}` | Create a record |
//! | `GET`    | `/api/{route}/{id}` | Fetch a record |
//! | `PUT`    | `/api/{route}/{id}` | Update a record |
//! | `DELETE` | `/api/{route}/{id}` | Move a record to the recycle bin |
//! | `POST`   | `/api/assets/{route}?filename=` | Upload an image (raw body) |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! `{route}` is one of `about`, `projects`, `services`, `skills`, `blog`,
//! `certificates`, `contacts`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "recycle bin entry not found: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unknown_collection_type` (400),
//! `unsupported_file_type` (400), `not_found` (404), `payload_too_large`
//! (413), `validation_error` (422), `internal` (500), `asset_store_error`
//! (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the portfolio site
//! and dashboard can call the API from the browser.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use folio_core::asset::AssetDeletion;
use folio_core::collection::CollectionType;
use folio_core::content::UploadError;
use folio_core::lifecycle::LifecycleError;
use folio_core::models::{Entity, RecycleBinEntry};

use crate::app::App;
use crate::config::Config;

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = Arc::new(App::open(config).await?);
    let router = router(app);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("folio API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;

    Ok(())
}

/// Build the API router over an [`App`].
pub fn router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Oversized uploads are rejected by the content layer with a JSON
    // error; the transport limit only stops runaway bodies.
    let upload_limit = app.max_upload_bytes.saturating_mul(2);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/recycle-bin", get(handle_list_bin))
        .route("/api/recycle-bin/restore/{id}", post(handle_restore))
        .route("/api/recycle-bin/{id}", axum::routing::delete(handle_purge))
        .route(
            "/api/assets/{route}",
            post(handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/{route}", get(handle_list).post(handle_create))
        .route(
            "/api/{route}/{id}",
            get(handle_get).put(handle_update).delete(handle_soft_delete),
        )
        .layer(cors)
        .with_state(app)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_found"`).
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound { .. } => not_found(err.to_string()),
            LifecycleError::UnknownCollectionType(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "unknown_collection_type", err.to_string())
            }
            LifecycleError::Validation { .. } => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", err.to_string())
            }
            LifecycleError::Persistence(ref e) => {
                tracing::error!(error = %format!("{:#}", e), "request failed");
                internal(err.to_string())
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NoImages(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "bad_request", err.to_string())
            }
            UploadError::UnsupportedType(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "unsupported_file_type", err.to_string())
            }
            UploadError::TooLarge { .. } => {
                AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", err.to_string())
            }
            UploadError::Store(ref e) => {
                tracing::error!(error = %format!("{:#}", e), "upload failed");
                AppError::new(StatusCode::BAD_GATEWAY, "asset_store_error", err.to_string())
            }
        }
    }
}

fn collection_for(route: &str) -> Result<CollectionType, AppError> {
    CollectionType::from_route(route).ok_or_else(|| not_found(format!("no collection at /api/{}", route)))
}

fn payload_of(entity: &Entity) -> Result<Value, AppError> {
    entity
        .to_payload()
        .map_err(|e| internal(format!("failed to encode record: {}", e)))
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

// ============ Recycle bin ============

async fn handle_list_bin(
    State(app): State<Arc<App>>,
) -> Result<Json<Vec<RecycleBinEntry>>, AppError> {
    Ok(Json(app.lifecycle.list().await?))
}

/// `POST /api/recycle-bin/restore/{id}` → `{ message, id }` with the new id.
async fn handle_restore(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let restored = app.lifecycle.restore(&id).await?;
    Ok(Json(json!({
        "message": format!("{} restored successfully", restored.collection_type()),
        "id": restored.id(),
    })))
}

#[derive(Serialize)]
struct PurgeResponse {
    message: String,
    assets: Vec<AssetDeletion>,
}

/// `DELETE /api/recycle-bin/{id}` → `{ message, assets }`.
///
/// Always 200 once the entry is gone, even if some asset deletions failed;
/// per-asset outcomes are listed in `assets`.
async fn handle_purge(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<PurgeResponse>, AppError> {
    let report = app.lifecycle.purge(&id).await?;
    let message = match report.failed_assets() {
        0 => "Item permanently deleted".to_string(),
        n => format!("Item permanently deleted; {} asset(s) could not be removed", n),
    };
    Ok(Json(PurgeResponse {
        message,
        assets: report.assets,
    }))
}

// ============ Collections ============

async fn handle_list(
    State(app): State<Arc<App>>,
    Path(route): Path<String>,
) -> Result<Json<Value>, AppError> {
    let collection = collection_for(&route)?;
    let entities = app.content.list(collection).await?;
    let payloads = entities
        .iter()
        .map(payload_of)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Value::Array(payloads)))
}

async fn handle_get(
    State(app): State<Arc<App>>,
    Path((route, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let collection = collection_for(&route)?;
    let entity = app.content.get(collection, &id).await?;
    Ok(Json(payload_of(&entity)?))
}

async fn handle_create(
    State(app): State<Arc<App>>,
    Path(route): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let collection = collection_for(&route)?;
    let entity = app.content.create(collection, payload).await?;
    Ok(Json(payload_of(&entity)?))
}

async fn handle_update(
    State(app): State<Arc<App>>,
    Path((route, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let collection = collection_for(&route)?;
    let updated = app.content.update(collection, &id, payload).await?;
    Ok(Json(payload_of(&updated.entity)?))
}

/// `DELETE /api/{route}/{id}` moves the record to the recycle bin.
async fn handle_soft_delete(
    State(app): State<Arc<App>>,
    Path((route, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let collection = collection_for(&route)?;
    let entry = app.lifecycle.soft_delete(collection, &id).await?;
    Ok(Json(json!({
        "message": format!("{} moved to recycle bin", collection),
        "entryId": entry.id,
    })))
}

// ============ POST /api/assets/{route} ============

#[derive(Deserialize)]
struct UploadParams {
    filename: String,
}

async fn handle_upload(
    State(app): State<Arc<App>>,
    Path(route): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let collection = collection_for(&route)?;
    let url = app
        .content
        .upload(collection, &params.filename, body.to_vec())
        .await?;
    Ok(Json(json!({ "url": url })))
}
