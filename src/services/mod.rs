//! Service layer: CSV mechanics, storage backends, the metadata catalog,
//! and the upload/read-back orchestration on top of them.

pub mod cache;
pub mod catalog;
pub mod csv_service;
pub mod file_service;
pub mod local_storage;
pub mod s3_storage;
pub mod storage;

use std::io;

use thiserror::Error;

/// Typed failures shared by every service-layer operation.
///
/// The HTTP boundary translates these into responses in
/// `errors::AppError`; nothing in this layer knows about status codes.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The client sent something we refuse to process (wrong extension,
    /// unusable filename). Raised before any parse or storage attempt.
    #[error("{0}")]
    InvalidInput(String),

    /// The CSV content itself could not be parsed.
    #[error("Invalid CSV format: {0}")]
    Parse(String),

    /// A catalog record or stored object does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The requested page lies beyond the available data.
    #[error("Page {page} out of range: {total_pages} page(s) available")]
    OutOfRange { page: i64, total_pages: i64 },

    /// The storage backend could not be reached even after the client's
    /// bounded retries. Safe for the caller to retry later.
    #[error("storage backend unavailable: {0}")]
    Transient(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
