use std::env;

use serde::{Deserialize, Serialize};

use crate::{AnyStore, FsStore, Result, S3Store};

/// Storage backend configuration shared by every service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage, one directory per bucket. Used by tests and
    /// single-node development setups.
    Fs {
        root: String,
    },
    /// S3-compatible object storage (MinIO in the reference deployment).
    S3 {
        endpoint: String,
        access_key: String,
        secret_key: String,
        #[serde(default)]
        use_ssl: bool,
        #[serde(default = "default_region")]
        region: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::S3 {
            endpoint: env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "minio:9000".to_string()),
            access_key: env::var("MINIO_ACCESS_KEY").unwrap_or_default(),
            secret_key: env::var("MINIO_SECRET_KEY").unwrap_or_default(),
            use_ssl: env::var("MINIO_USE_SSL").map(|v| v == "true").unwrap_or(false),
            region: default_region(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl StorageConfig {
    /// Endpoint URL including scheme, as the S3 client expects it.
    pub fn endpoint_url(&self) -> Option<String> {
        match self {
            StorageConfig::Fs { .. } => None,
            StorageConfig::S3 {
                endpoint, use_ssl, ..
            } => {
                if endpoint.contains("://") {
                    Some(endpoint.clone())
                } else if *use_ssl {
                    Some(format!("https://{endpoint}"))
                } else {
                    Some(format!("http://{endpoint}"))
                }
            }
        }
    }
}

/// Opens a store bound to `bucket` on the configured backend.
pub async fn open(config: &StorageConfig, bucket: &str) -> Result<AnyStore> {
    match config {
        StorageConfig::Fs { root } => {
            tracing::debug!(root, bucket, "opening filesystem store");
            Ok(AnyStore::Fs(FsStore::new(root, bucket)))
        }
        StorageConfig::S3 { .. } => {
            tracing::debug!(bucket, "opening s3 store");
            Ok(AnyStore::S3(S3Store::new(config, bucket)?))
        }
    }
}
