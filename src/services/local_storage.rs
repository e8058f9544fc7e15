//! Filesystem-backed storage for uploaded files.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use super::storage::{StorageBackend, stored_reference};
use super::{ServiceError, ServiceResult};

/// Stores uploads as flat files beneath a configured root directory.
///
/// Writes land in a temporary sibling first and are renamed into place, so
/// a crashed upload never leaves a partial file under a live reference.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create the backend, creating the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> ServiceResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn object_path(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn save(&self, id: Uuid, content: Bytes, original_name: &str) -> ServiceResult<String> {
        let reference = stored_reference(id, original_name);
        let path = self.object_path(&reference);

        // The root may have been removed out from under a long-lived
        // process; recreate it rather than failing the upload.
        fs::create_dir_all(&self.root).await?;

        let tmp_path = self.root.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = write_all_and_sync(&mut file, &content).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &path).await {
            // Windows refuses to rename over an existing file.
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&path).await?;
                fs::rename(&tmp_path, &path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err.into());
            }
        }

        debug!(path = %path.display(), bytes = content.len(), "saved upload to disk");
        Ok(reference)
    }

    async fn read(&self, stored_reference: &str) -> ServiceResult<Bytes> {
        let path = self.object_path(stored_reference);
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "read stored file");
                Ok(Bytes::from(bytes))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ServiceError::NotFound(
                format!("Stored file `{stored_reference}`"),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn probe(&self) -> ServiceResult<()> {
        // Best-effort write/read/delete of a throwaway file under the root.
        let tmp_path = self.root.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let bytes = fs::read(&tmp_path).await?;
        let _ = fs::remove_file(&tmp_path).await;
        if bytes == b"readyz" {
            Ok(())
        } else {
            Err(ServiceError::Io(std::io::Error::new(
                ErrorKind::Other,
                "probe file content mismatch",
            )))
        }
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

async fn write_all_and_sync(file: &mut File, content: &[u8]) -> std::io::Result<()> {
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend() -> (LocalStorage, TempDir) {
        let dir = TempDir::new().expect("create temp dir");
        let storage = LocalStorage::new(dir.path()).expect("create storage root");
        (storage, dir)
    }

    #[tokio::test]
    async fn save_then_read_round_trips() {
        let (storage, _dir) = backend();
        let id = Uuid::new_v4();
        let content = Bytes::from_static(b"id,name\n1,Test\n");

        let reference = storage
            .save(id, content.clone(), "data.csv")
            .await
            .expect("save");
        assert_eq!(reference, format!("{id}_data.csv"));

        let read_back = storage.read(&reference).await.expect("read");
        assert_eq!(read_back, content);
    }

    #[tokio::test]
    async fn save_leaves_no_temp_files_behind() {
        let (storage, dir) = backend();
        storage
            .save(Uuid::new_v4(), Bytes::from_static(b"a\n1\n"), "a.csv")
            .await
            .expect("save");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_an_existing_reference() {
        let (storage, _dir) = backend();
        let id = Uuid::new_v4();
        storage
            .save(id, Bytes::from_static(b"old"), "a.csv")
            .await
            .expect("first save");
        storage
            .save(id, Bytes::from_static(b"new"), "a.csv")
            .await
            .expect("second save");

        let read_back = storage.read(&format!("{id}_a.csv")).await.expect("read");
        assert_eq!(read_back.as_ref(), b"new");
    }

    #[tokio::test]
    async fn read_missing_reference_is_not_found() {
        let (storage, _dir) = backend();
        let err = storage.read("missing_file.csv").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn probe_succeeds_on_a_writable_root() {
        let (storage, _dir) = backend();
        assert!(storage.probe().await.is_ok());
    }
}
