use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{ObjectBody, ObjectInfo, Result, Store, StoreError};

/// Local-filesystem backend: `{root}/{bucket}/{key}`. Content types and the
/// public-read policy have no filesystem equivalent and are accepted as no-ops.
pub struct FsStore {
    root: PathBuf,
    bucket: String,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>, bucket: &str) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.to_string(),
        }
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.bucket_dir().join(key)
    }

    /// Recursively collects object keys (relative, '/'-separated) under the
    /// bucket directory.
    async fn walk(&self) -> Result<Vec<ObjectInfo>> {
        let base = self.bucket_dir();
        let mut pending = vec![base.clone()];
        let mut objects = Vec::new();
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(io_error(err, &dir)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(e, &dir))? {
                let path = entry.path();
                let meta = entry.metadata().await.map_err(|e| io_error(e, &path))?;
                if meta.is_dir() {
                    pending.push(path);
                } else {
                    let key = path
                        .strip_prefix(&base)
                        .map_err(|e| StoreError::Invalid(e.to_string()))?
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    objects.push(ObjectInfo {
                        key,
                        size: meta.len() as i64,
                    });
                }
            }
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

fn io_error(err: std::io::Error, path: &Path) -> StoreError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(path.to_string_lossy().to_string())
    } else {
        StoreError::Transient(format!("{}: {err}", path.display()))
    }
}

#[async_trait]
impl Store for FsStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn ensure_bucket(&self) -> Result<()> {
        let dir = self.bucket_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(e, &dir))
    }

    async fn set_public_read(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(e, parent))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| io_error(e, &path))
    }

    async fn put_file(&self, key: &str, src: &Path, _content_type: &str) -> Result<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(e, parent))?;
        }
        tokio::fs::copy(src, &path)
            .await
            .map_err(|e| io_error(e, src))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectBody> {
        let path = self.object_path(key);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| io_error(e, &path))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| io_error(e, &path))?
            .len() as i64;
        Ok(ObjectBody {
            size,
            reader: Box::pin(file),
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        let path = self.object_path(key);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(e, &path))?;
        Ok(ObjectInfo {
            key: key.to_string(),
            size: meta.len() as i64,
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .walk()
            .await?
            .into_iter()
            .filter(|obj| obj.key.starts_with(prefix))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(err, &path)),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let matched = self.list(prefix).await?;
        for obj in &matched {
            self.delete(&obj.key).await?;
        }
        // Drop the now-empty directory tree when the prefix maps to one.
        let dir = self.bucket_dir().join(prefix.trim_end_matches('/'));
        if dir.is_dir() {
            let _ = tokio::fs::remove_dir_all(&dir).await;
        }
        Ok(matched.len())
    }

    async fn download_to(&self, key: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(e, parent))?;
        }
        let src = self.object_path(key);
        tokio::fs::copy(&src, dest)
            .await
            .map_err(|e| io_error(e, &src))?;
        Ok(())
    }

    async fn copy_from(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_key: &str,
        _content_type: &str,
    ) -> Result<()> {
        let src = self.root.join(src_bucket).join(src_key);
        let dst = self.object_path(dst_key);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(e, parent))?;
        }
        tokio::fs::copy(&src, &dst)
            .await
            .map_err(|e| io_error(e, &src))?;
        Ok(())
    }
}
