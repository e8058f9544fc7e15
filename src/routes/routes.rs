//! Defines routes for the CSV file API.
//!
//! ## Structure
//! - **File endpoints** (under `/api`)
//!   - `POST /api/upload_file` — upload a CSV file (multipart field `file`)
//!   - `GET  /api/files` — list uploaded files (supports page, page_size)
//!   - `GET  /api/file/{file_id}/metadata` — catalog record for one file
//!   - `GET  /api/file/{file_id}/data` — paginated parsed rows
//!
//! - **Health endpoints** (mounted at root)
//!   - `GET /healthz` — liveness
//!   - `GET /readyz` — readiness (SQLite + storage backend)

use crate::{
    handlers::{
        file_handlers::{file_data, file_metadata, list_files, upload_file},
        health_handlers::{healthz, readyz},
    },
    services::file_service::FileService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Uploads are buffered whole for parsing, so request bodies are capped.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build and return the router for the whole API surface.
///
/// The router carries shared state (`FileService`) to all handlers.
pub fn routes() -> Router<FileService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // file endpoints
        .route("/api/upload_file", post(upload_file))
        .route("/api/files", get(list_files))
        .route("/api/file/{file_id}/metadata", get(file_metadata))
        .route("/api/file/{file_id}/data", get(file_data))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
