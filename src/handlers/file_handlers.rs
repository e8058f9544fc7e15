//! HTTP handlers for the CSV file API.
//!
//! Handlers stay thin: enforce pagination bounds, consult the response
//! cache, and delegate to `FileService`. Typed service failures become
//! HTTP responses in `errors::AppError`.

use crate::{
    errors::AppError,
    models::file::FileRecord,
    services::{
        cache::{FILE_DATA_TTL, LIST_FILES_TTL},
        file_service::FileService,
    },
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

/// Largest page a client may request, for listings and data alike.
const MAX_PAGE_SIZE: i64 = 100;

/// Query params accepted by `GET /api/files`.
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Query params accepted by `GET /api/file/{file_id}/data`.
#[derive(Debug, Deserialize)]
pub struct FileDataQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub row_count: i64,
    pub column_count: i64,
}

#[derive(Debug, Serialize)]
pub struct FileMetadataResponse {
    pub id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub upload_timestamp: String,
    pub file_size: i64,
    pub row_count: i64,
    pub column_count: i64,
    pub delimiter: String,
}

impl From<&FileRecord> for FileMetadataResponse {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            original_filename: record.original_filename.clone(),
            stored_filename: record.stored_filename.clone(),
            upload_timestamp: record.uploaded_at.to_rfc3339(),
            file_size: record.file_size,
            row_count: record.row_count,
            column_count: record.column_count,
            delimiter: record.delimiter.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileMetadataResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct FileDataResponse {
    pub id: Uuid,
    pub filename: String,
    pub data: Vec<Map<String, Value>>,
    pub total_rows: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// `POST /api/upload_file` — multipart upload of one CSV file.
pub async fn upload_file(
    State(service): State<FileService>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .ok_or_else(|| AppError::bad_request("upload field `file` has no filename"))?
                .to_string();
            let content = field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(format!("failed to read upload: {err}")))?;
            upload = Some((filename, content));
            break;
        }
    }
    let (filename, content) =
        upload.ok_or_else(|| AppError::bad_request("multipart field `file` is required"))?;

    info!(%filename, bytes = content.len(), "received upload request");
    let record = service.upload_csv(&filename, content).await?;

    let body = UploadResponse {
        message: "File uploaded successfully".into(),
        file_id: record.id,
        filename: record.original_filename,
        file_size: record.file_size,
        row_count: record.row_count,
        column_count: record.column_count,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// `GET /api/files` — paginated catalog listing, cached for a minute.
pub async fn list_files(
    State(service): State<FileService>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Value>, AppError> {
    let (page, page_size) = pagination_bounds(query.page, query.page_size, 10)?;

    let cache_key = format!("files:page={page}:page_size={page_size}");
    if let Some(hit) = service.cache.get(&cache_key).await {
        return Ok(Json(hit));
    }

    let listing = service.list_files(page, page_size).await?;
    let body = FileListResponse {
        files: listing.files.iter().map(Into::into).collect(),
        total: listing.total,
        page,
        page_size,
        total_pages: listing.total_pages,
    };

    let value = serde_json::to_value(&body).map_err(|err| AppError::internal(err.to_string()))?;
    service
        .cache
        .insert(cache_key, value.clone(), LIST_FILES_TTL)
        .await;
    Ok(Json(value))
}

/// `GET /api/file/{file_id}/metadata` — catalog record for one file.
pub async fn file_metadata(
    State(service): State<FileService>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = service.file_metadata(file_id).await?;
    Ok(Json(FileMetadataResponse::from(&record)))
}

/// `GET /api/file/{file_id}/data` — one page of parsed rows, cached for
/// two minutes.
pub async fn file_data(
    State(service): State<FileService>,
    Path(file_id): Path<Uuid>,
    Query(query): Query<FileDataQuery>,
) -> Result<Json<Value>, AppError> {
    let (page, page_size) = pagination_bounds(query.page, query.page_size, 100)?;

    let cache_key = format!("data:{file_id}:page={page}:page_size={page_size}");
    if let Some(hit) = service.cache.get(&cache_key).await {
        return Ok(Json(hit));
    }

    info!(%file_id, page, page_size, "retrieving file data");
    let (record, csv_page) = service.file_page(file_id, page, page_size).await?;
    let body = FileDataResponse {
        id: record.id,
        filename: record.original_filename,
        data: csv_page.rows,
        total_rows: csv_page.total_rows,
        page,
        page_size,
        total_pages: csv_page.total_pages,
    };

    let value = serde_json::to_value(&body).map_err(|err| AppError::internal(err.to_string()))?;
    service
        .cache
        .insert(cache_key, value.clone(), FILE_DATA_TTL)
        .await;
    Ok(Json(value))
}

/// Apply defaults and the boundary's pagination limits. The core never
/// sees a page below 1 or a page size outside `1..=100`.
fn pagination_bounds(
    page: Option<i64>,
    page_size: Option<i64>,
    default_size: i64,
) -> Result<(i64, i64), AppError> {
    let page = page.unwrap_or(1);
    let page_size = page_size.unwrap_or(default_size);

    if page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::bad_request(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok((page, page_size))
}
