//! Represents an uploaded CSV file tracked by the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// A single catalog record for an uploaded CSV file.
///
/// The record describes the file as it was parsed at upload time; the raw
/// bytes live in the storage backend under `stored_filename`. Records are
/// written once and never updated.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct FileRecord {
    /// Unique identifier, generated at upload.
    pub id: Uuid,

    /// Filename exactly as the client sent it.
    pub original_filename: String,

    /// Reference the raw bytes were saved under in the storage backend.
    /// Unique across the catalog.
    pub stored_filename: String,

    /// Size of the uploaded content in bytes.
    pub file_size: i64,

    /// Number of data rows found by the upload-time parse.
    pub row_count: i64,

    /// Number of columns found by the upload-time parse.
    pub column_count: i64,

    /// Column names, in file order.
    pub columns: Json<Vec<String>>,

    /// Single-character field delimiter the file was parsed with.
    pub delimiter: String,

    /// When the catalog accepted the record.
    pub uploaded_at: DateTime<Utc>,
}

/// Metadata assembled for a freshly validated upload whose bytes have
/// already been persisted. The catalog assigns `uploaded_at` when it
/// turns this into a [`FileRecord`].
#[derive(Debug, Clone)]
pub struct NewFileMetadata {
    pub id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_size: i64,
    pub row_count: i64,
    pub column_count: i64,
    pub columns: Vec<String>,
    pub delimiter: String,
}
