use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

pub mod config;
pub mod content_type;
pub mod fs;
pub mod s3;

#[cfg(test)]
mod tests;

pub use config::{open, StorageConfig};
pub use content_type::content_type_for;
pub use fs::FsStore;
pub use s3::S3Store;

/// Bounded error taxonomy for all object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("authentication: {0}")]
    Auth(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("transient: {0}")]
    Transient(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: i64,
}

/// An object opened for reading, streamed rather than buffered.
pub struct ObjectBody {
    pub size: i64,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

/// Bucket-scoped object store operations.
///
/// One store instance is bound to one bucket; cross-bucket moves go through
/// [`Store::copy_from`], which uses the backend's server-side copy so object
/// bytes never stream through the process.
#[async_trait]
pub trait Store: Send + Sync {
    fn bucket(&self) -> &str;

    /// Creates the bucket when missing. Idempotent check-then-create.
    async fn ensure_bucket(&self) -> Result<()>;

    /// Installs a policy granting anonymous GET on every object in the bucket.
    async fn set_public_read(&self) -> Result<()>;

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<ObjectBody>;

    async fn stat(&self, key: &str) -> Result<ObjectInfo>;

    /// Lists every object under `prefix`, recursively.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes every object under `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;

    async fn download_to(&self, key: &str, dest: &Path) -> Result<()>;

    /// Server-side copy of `{src_bucket}/{src_key}` into this bucket.
    async fn copy_from(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_key: &str,
        content_type: &str,
    ) -> Result<()>;
}

/// Configured backend dispatch, in the spirit of a `Drive` enum: S3-compatible
/// object storage in production, the local filesystem in tests and dev.
pub enum AnyStore {
    S3(S3Store),
    Fs(FsStore),
}

#[async_trait]
impl Store for AnyStore {
    fn bucket(&self) -> &str {
        match self {
            AnyStore::S3(store) => store.bucket(),
            AnyStore::Fs(store) => store.bucket(),
        }
    }

    async fn ensure_bucket(&self) -> Result<()> {
        match self {
            AnyStore::S3(store) => store.ensure_bucket().await,
            AnyStore::Fs(store) => store.ensure_bucket().await,
        }
    }

    async fn set_public_read(&self) -> Result<()> {
        match self {
            AnyStore::S3(store) => store.set_public_read().await,
            AnyStore::Fs(store) => store.set_public_read().await,
        }
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        match self {
            AnyStore::S3(store) => store.put(key, data, content_type).await,
            AnyStore::Fs(store) => store.put(key, data, content_type).await,
        }
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        match self {
            AnyStore::S3(store) => store.put_file(key, path, content_type).await,
            AnyStore::Fs(store) => store.put_file(key, path, content_type).await,
        }
    }

    async fn get(&self, key: &str) -> Result<ObjectBody> {
        match self {
            AnyStore::S3(store) => store.get(key).await,
            AnyStore::Fs(store) => store.get(key).await,
        }
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        match self {
            AnyStore::S3(store) => store.stat(key).await,
            AnyStore::Fs(store) => store.stat(key).await,
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        match self {
            AnyStore::S3(store) => store.list(prefix).await,
            AnyStore::Fs(store) => store.list(prefix).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            AnyStore::S3(store) => store.delete(key).await,
            AnyStore::Fs(store) => store.delete(key).await,
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        match self {
            AnyStore::S3(store) => store.delete_prefix(prefix).await,
            AnyStore::Fs(store) => store.delete_prefix(prefix).await,
        }
    }

    async fn download_to(&self, key: &str, dest: &Path) -> Result<()> {
        match self {
            AnyStore::S3(store) => store.download_to(key, dest).await,
            AnyStore::Fs(store) => store.download_to(key, dest).await,
        }
    }

    async fn copy_from(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_key: &str,
        content_type: &str,
    ) -> Result<()> {
        match self {
            AnyStore::S3(store) => store.copy_from(src_bucket, src_key, dst_key, content_type).await,
            AnyStore::Fs(store) => store.copy_from(src_bucket, src_key, dst_key, content_type).await,
        }
    }
}
