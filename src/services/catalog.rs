//! SQLite-backed catalog of uploaded file metadata.

use std::sync::Arc;

use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Pool, Sqlite};
use tracing::debug;
use uuid::Uuid;

use crate::models::file::{FileRecord, NewFileMetadata};

use super::{ServiceError, ServiceResult};

/// Thin query layer over the shared SQLite pool.
///
/// Records are immutable once written; the catalog assigns the upload
/// timestamp at insert so ordering is decided in exactly one place.
#[derive(Clone)]
pub struct FileCatalog {
    pub db: Arc<Pool<Sqlite>>,
}

impl FileCatalog {
    pub fn new(db: Arc<Pool<Sqlite>>) -> Self {
        Self { db }
    }

    /// Persist extracted metadata as a new record and return it as stored.
    pub async fn create(&self, new: NewFileMetadata) -> ServiceResult<FileRecord> {
        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO csv_files (
                id, original_filename, stored_filename, file_size,
                row_count, column_count, columns, delimiter, uploaded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, original_filename, stored_filename, file_size,
                      row_count, column_count, columns, delimiter, uploaded_at
            "#,
        )
        .bind(new.id)
        .bind(&new.original_filename)
        .bind(&new.stored_filename)
        .bind(new.file_size)
        .bind(new.row_count)
        .bind(new.column_count)
        .bind(Json(&new.columns))
        .bind(&new.delimiter)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        debug!(id = %record.id, "catalog record created");
        Ok(record)
    }

    /// Fetch one record by id; `NotFound` when no such file exists.
    pub async fn get(&self, id: Uuid) -> ServiceResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, original_filename, stored_filename, file_size,
                   row_count, column_count, columns, delimiter, uploaded_at
            FROM csv_files
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound("File".to_string()),
            other => ServiceError::Sqlx(other),
        })
    }

    /// Newest-first page of records.
    pub async fn list(&self, skip: i64, limit: i64) -> ServiceResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, original_filename, stored_filename, file_size,
                   row_count, column_count, columns, delimiter, uploaded_at
            FROM csv_files
            ORDER BY uploaded_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }

    /// Total number of cataloged files.
    pub async fn count(&self) -> ServiceResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM csv_files")
            .fetch_one(&*self.db)
            .await?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_catalog() -> FileCatalog {
        let db = Arc::new(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .expect("open in-memory sqlite"),
        );
        crate::run_migrations(&db).await.expect("apply migrations");
        FileCatalog::new(db)
    }

    fn sample_metadata(name: &str) -> NewFileMetadata {
        NewFileMetadata {
            id: Uuid::new_v4(),
            original_filename: name.to_string(),
            stored_filename: format!("{}_{name}", Uuid::new_v4()),
            file_size: 42,
            row_count: 2,
            column_count: 3,
            columns: vec!["id".into(), "name".into(), "value".into()],
            delimiter: ",".into(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let catalog = test_catalog().await;
        let new = sample_metadata("data.csv");
        let id = new.id;

        let created = catalog.create(new).await.expect("create");
        assert_eq!(created.id, id);
        assert_eq!(created.columns.0, vec!["id", "name", "value"]);

        let fetched = catalog.get(id).await.expect("get");
        assert_eq!(fetched.original_filename, "data.csv");
        assert_eq!(fetched.uploaded_at, created.uploaded_at);
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let catalog = test_catalog().await;
        let err = catalog.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "got {err:?}");
        assert_eq!(err.to_string(), "File not found");
    }

    #[tokio::test]
    async fn list_is_newest_first_and_count_tracks_inserts() {
        let catalog = test_catalog().await;
        for n in 0..3 {
            catalog
                .create(sample_metadata(&format!("file_{n}.csv")))
                .await
                .expect("create");
        }

        assert_eq!(catalog.count().await.expect("count"), 3);

        let page = catalog.list(0, 2).await.expect("list");
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].original_filename, "file_2.csv");
        assert_eq!(page[1].original_filename, "file_1.csv");

        let rest = catalog.list(2, 2).await.expect("list");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].original_filename, "file_0.csv");
    }
}
