//! Storage backend contract and construction.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::{AppConfig, StorageKind};

use super::local_storage::LocalStorage;
use super::s3_storage::S3Storage;
use super::ServiceResult;

/// Uniform save/read contract over raw upload bytes.
///
/// Implementations own their location (root directory or bucket), fixed at
/// construction. `save` must tolerate concurrent saves of distinct ids;
/// a same-reference race is last-writer-wins.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persist `content` under a reference derived from `id` and
    /// `original_name`, returning that reference for the catalog to
    /// record.
    async fn save(&self, id: Uuid, content: Bytes, original_name: &str) -> ServiceResult<String>;

    /// Fetch the complete content for a previously returned reference.
    /// `NotFound` when the reference no longer resolves.
    async fn read(&self, stored_reference: &str) -> ServiceResult<Bytes>;

    /// Cheap connectivity check for the readiness endpoint.
    async fn probe(&self) -> ServiceResult<()>;

    /// Short label for logs and health output.
    fn kind(&self) -> &'static str;
}

/// Reference both backends file uploads under. Prefixing the original
/// name with the id keeps references unique without renaming collisions.
pub fn stored_reference(id: Uuid, original_name: &str) -> String {
    format!("{id}_{original_name}")
}

/// Build the backend the configuration selects. Called once at startup,
/// so invalid remote configuration (a missing bucket name, say) fails the
/// process instead of the first upload.
pub fn build_storage_backend(cfg: &AppConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match cfg.backend {
        StorageKind::Local => {
            let backend = LocalStorage::new(cfg.upload_dir.clone())?;
            Ok(Arc::new(backend))
        }
        StorageKind::S3 => {
            let backend = S3Storage::from_config(cfg)?;
            Ok(Arc::new(backend))
        }
    }
}
