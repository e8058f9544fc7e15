//! Upload and read-back orchestration over the catalog and the storage
//! backend.
//!
//! The two core flows live here as free functions so they are testable
//! against any [`StorageBackend`]: [`extract_file_info`] turns an uploaded
//! buffer into catalog metadata, and [`read_csv_page`] re-parses a stored
//! file and slices out one page of rows. [`FileService`] bundles them with
//! the catalog as the shared axum state.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::models::file::{FileRecord, NewFileMetadata};

use super::cache::ResponseCache;
use super::catalog::FileCatalog;
use super::csv_service::{self, delimiter_from_label, delimiter_label};
use super::storage::StorageBackend;
use super::{ServiceError, ServiceResult};

/// Shared state for the HTTP handlers: metadata catalog, storage backend,
/// and the boundary response cache. The core methods never touch the
/// cache; handlers consult it before calling in.
#[derive(Clone)]
pub struct FileService {
    pub catalog: FileCatalog,
    pub storage: Arc<dyn StorageBackend>,
    pub cache: ResponseCache,
}

/// One page of parsed rows plus the pagination counters computed from the
/// full file.
#[derive(Debug)]
pub struct CsvPage {
    pub rows: Vec<Map<String, Value>>,
    pub total_rows: i64,
    pub total_pages: i64,
}

/// One page of catalog records.
#[derive(Debug)]
pub struct FileListing {
    pub files: Vec<FileRecord>,
    pub total: i64,
    pub total_pages: i64,
}

impl FileService {
    pub fn new(catalog: FileCatalog, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            catalog,
            storage,
            cache: ResponseCache::new(),
        }
    }

    /// Validate, parse, and store an uploaded file, then catalog it.
    pub async fn upload_csv(&self, filename: &str, content: Bytes) -> ServiceResult<FileRecord> {
        let metadata = extract_file_info(self.storage.as_ref(), filename, content).await?;
        let record = self.catalog.create(metadata).await?;
        info!(
            id = %record.id,
            filename = %record.original_filename,
            rows = record.row_count,
            "file uploaded"
        );
        Ok(record)
    }

    /// Catalog record for one file.
    pub async fn file_metadata(&self, id: Uuid) -> ServiceResult<FileRecord> {
        self.catalog.get(id).await
    }

    /// Newest-first page of the catalog. `skip >= total` on a non-empty
    /// catalog is out of range, matching the data endpoint's semantics.
    pub async fn list_files(&self, page: i64, page_size: i64) -> ServiceResult<FileListing> {
        let skip = (page - 1) * page_size;
        let total = self.catalog.count().await?;
        let total_pages = pages_for(total, page_size);

        if skip >= total && total > 0 {
            return Err(ServiceError::OutOfRange { page, total_pages });
        }

        let files = self.catalog.list(skip, page_size).await?;
        Ok(FileListing {
            files,
            total,
            total_pages,
        })
    }

    /// One page of a stored file's parsed rows, along with its record.
    pub async fn file_page(
        &self,
        id: Uuid,
        page: i64,
        page_size: i64,
    ) -> ServiceResult<(FileRecord, CsvPage)> {
        let record = self.catalog.get(id).await?;
        let csv_page = read_csv_page(self.storage.as_ref(), &record, page, page_size).await?;
        Ok((record, csv_page))
    }
}

/// Extract metadata for a newly uploaded file and persist its bytes.
///
/// Order matters: the filename check runs before any parse or storage side
/// effect, and a parse failure leaves nothing behind in the backend. The
/// catalog assigns the upload timestamp when the returned metadata is
/// inserted.
pub async fn extract_file_info(
    storage: &dyn StorageBackend,
    filename: &str,
    content: Bytes,
) -> ServiceResult<NewFileMetadata> {
    validate_csv_filename(filename)?;

    let id = Uuid::new_v4();
    let file_size = content.len() as i64;

    let delimiter = csv_service::sniff_delimiter(&content);
    let parsed = csv_service::parse_csv(&content, delimiter)?;
    info!(
        %filename,
        rows = parsed.row_count(),
        columns = parsed.column_count(),
        delimiter = %delimiter_label(delimiter),
        "parsed upload"
    );

    let stored_filename = storage.save(id, content, filename).await?;

    Ok(NewFileMetadata {
        id,
        original_filename: filename.to_string(),
        stored_filename,
        file_size,
        row_count: parsed.row_count() as i64,
        column_count: parsed.column_count() as i64,
        columns: parsed.columns,
        delimiter: delimiter_label(delimiter),
    })
}

/// Re-read a stored file and return the requested page of rows.
///
/// The whole file is parsed on every call, so the page always reflects the
/// latest stored bytes. Page 1 of a zero-row file succeeds with no rows;
/// any page past the end of a non-empty file is out of range.
pub async fn read_csv_page(
    storage: &dyn StorageBackend,
    record: &FileRecord,
    page: i64,
    page_size: i64,
) -> ServiceResult<CsvPage> {
    let content = storage.read(&record.stored_filename).await?;
    let delimiter = delimiter_from_label(&record.delimiter)?;
    let parsed = csv_service::parse_csv(&content, delimiter)?;

    let total_rows = parsed.row_count() as i64;
    let total_pages = pages_for(total_rows, page_size);
    if page > total_pages && total_rows > 0 {
        return Err(ServiceError::OutOfRange { page, total_pages });
    }

    let start = ((page - 1) * page_size).min(total_rows) as usize;
    let end = (start as i64 + page_size).min(total_rows) as usize;
    let rows = csv_service::render_rows(&parsed, start, end);

    Ok(CsvPage {
        rows,
        total_rows,
        total_pages,
    })
}

/// Only `.csv` uploads are accepted, and the filename becomes part of the
/// stored reference, so it must not smuggle in path components.
fn validate_csv_filename(filename: &str) -> ServiceResult<()> {
    if !filename.ends_with(".csv") {
        return Err(ServiceError::InvalidInput(
            "Invalid file type. Only CSV files are allowed.".into(),
        ));
    }
    if filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.bytes().any(|b| b.is_ascii_control())
    {
        return Err(ServiceError::InvalidInput(
            "Invalid filename.".into(),
        ));
    }
    Ok(())
}

fn pages_for(total_rows: i64, page_size: i64) -> i64 {
    (total_rows + page_size - 1) / page_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::local_storage::LocalStorage;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    const SAMPLE: &[u8] = b"id,name,value\n1,Test,100\n2,Another,200";

    async fn test_service() -> (FileService, TempDir) {
        let dir = TempDir::new().expect("create temp dir");
        let storage = Arc::new(LocalStorage::new(dir.path()).expect("create storage root"));
        let db = Arc::new(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .expect("open in-memory sqlite"),
        );
        crate::run_migrations(&db).await.expect("apply migrations");
        (FileService::new(FileCatalog::new(db), storage), dir)
    }

    #[tokio::test]
    async fn upload_extracts_metadata_and_catalogs_the_file() {
        let (service, _dir) = test_service().await;
        let record = service
            .upload_csv("data.csv", Bytes::from_static(SAMPLE))
            .await
            .expect("upload");

        assert_eq!(record.original_filename, "data.csv");
        assert_eq!(record.stored_filename, format!("{}_data.csv", record.id));
        assert_eq!(record.file_size, SAMPLE.len() as i64);
        assert_eq!(record.row_count, 2);
        assert_eq!(record.column_count, 3);
        assert_eq!(record.columns.0, vec!["id", "name", "value"]);
        assert_eq!(record.delimiter, ",");

        let fetched = service.file_metadata(record.id).await.expect("get");
        assert_eq!(fetched.stored_filename, record.stored_filename);
    }

    #[tokio::test]
    async fn upload_detects_non_comma_delimiters() {
        let (service, _dir) = test_service().await;
        let record = service
            .upload_csv("semi.csv", Bytes::from_static(b"a;b\n1;2\n"))
            .await
            .expect("upload");
        assert_eq!(record.delimiter, ";");
        assert_eq!(record.column_count, 2);
    }

    #[tokio::test]
    async fn non_csv_filename_is_rejected_before_any_side_effect() {
        let (service, dir) = test_service().await;
        let err = service
            .upload_csv("data.txt", Bytes::from_static(SAMPLE))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)), "got {err:?}");

        // Nothing cataloged, nothing written.
        assert_eq!(service.catalog.count().await.expect("count"), 0);
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn path_traversing_filenames_are_rejected() {
        let (service, _dir) = test_service().await;
        for name in ["../../etc/evil.csv", "a/b.csv", "a\\b.csv"] {
            let err = service
                .upload_csv(name, Bytes::from_static(SAMPLE))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn malformed_csv_leaves_nothing_stored() {
        let (service, dir) = test_service().await;
        let err = service
            .upload_csv("ragged.csv", Bytes::from_static(b"a,b\n1,2,3\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Parse(_)), "got {err:?}");
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn first_page_of_size_one_returns_the_first_row() {
        let (service, _dir) = test_service().await;
        let record = service
            .upload_csv("data.csv", Bytes::from_static(SAMPLE))
            .await
            .expect("upload");

        let (_, page) = service.file_page(record.id, 1, 1).await.expect("page 1");
        assert_eq!(page.total_rows, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(
            Value::Object(page.rows[0].clone()),
            json!({"id": 1, "name": "Test", "value": 100})
        );
    }

    #[tokio::test]
    async fn last_page_holds_the_remainder() {
        let (service, _dir) = test_service().await;
        let record = service
            .upload_csv("five.csv", Bytes::from_static(b"n\n1\n2\n3\n4\n5\n"))
            .await
            .expect("upload");

        let (_, page) = service.file_page(record.id, 3, 2).await.expect("page 3");
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0]["n"], json!(5));
    }

    #[tokio::test]
    async fn page_past_the_end_is_out_of_range() {
        let (service, _dir) = test_service().await;
        let record = service
            .upload_csv("data.csv", Bytes::from_static(SAMPLE))
            .await
            .expect("upload");

        let err = service.file_page(record.id, 3, 1).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::OutOfRange { page: 3, total_pages: 2 }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn first_page_of_an_empty_file_is_empty_not_an_error() {
        let (service, _dir) = test_service().await;
        let record = service
            .upload_csv("empty.csv", Bytes::from_static(b"id,name,value\n"))
            .await
            .expect("upload");
        assert_eq!(record.row_count, 0);

        let (_, page) = service.file_page(record.id, 1, 10).await.expect("page 1");
        assert_eq!(page.rows.len(), 0);
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn unknown_file_id_is_not_found() {
        let (service, _dir) = test_service().await;
        let err = service.file_page(Uuid::new_v4(), 1, 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_stored_object_is_not_found() {
        let (service, dir) = test_service().await;
        let record = service
            .upload_csv("data.csv", Bytes::from_static(SAMPLE))
            .await
            .expect("upload");

        std::fs::remove_file(dir.path().join(&record.stored_filename)).expect("remove");

        let err = service.file_page(record.id, 1, 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn listing_pages_through_the_catalog_newest_first() {
        let (service, _dir) = test_service().await;
        for n in 0..3 {
            service
                .upload_csv(&format!("file_{n}.csv"), Bytes::from_static(b"a,b\n1,2\n"))
                .await
                .expect("upload");
        }

        let listing = service.list_files(1, 2).await.expect("page 1");
        assert_eq!(listing.total, 3);
        assert_eq!(listing.total_pages, 2);
        assert_eq!(listing.files.len(), 2);
        assert_eq!(listing.files[0].original_filename, "file_2.csv");

        let listing = service.list_files(2, 2).await.expect("page 2");
        assert_eq!(listing.files.len(), 1);

        let err = service.list_files(3, 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::OutOfRange { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn listing_an_empty_catalog_succeeds() {
        let (service, _dir) = test_service().await;
        let listing = service.list_files(1, 10).await.expect("list");
        assert_eq!(listing.total, 0);
        assert_eq!(listing.total_pages, 0);
        assert!(listing.files.is_empty());
    }
}
