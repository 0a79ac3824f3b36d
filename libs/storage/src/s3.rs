use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, SharedCredentialsProvider};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;

use crate::{ObjectBody, ObjectInfo, Result, StorageConfig, Store, StoreError};

/// S3-compatible backend over one bucket.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    pub fn new(config: &StorageConfig, bucket: &str) -> Result<Self> {
        let StorageConfig::S3 {
            access_key,
            secret_key,
            region,
            ..
        } = config
        else {
            return Err(StoreError::Invalid(
                "s3 store requires an s3 storage config".to_string(),
            ));
        };

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            // MinIO serves buckets under the path, not a subdomain.
            .force_path_style(true)
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "ConfiguredCredentialsProvider",
            )));
        if let Some(endpoint) = config.endpoint_url() {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        })
    }

    fn anonymous_read_policy(&self) -> String {
        format!(
            r#"{{"Version":"2012-10-17","Statement":[{{"Effect":"Allow","Principal":{{"AWS":"*"}},"Action":["s3:GetObject"],"Resource":["arn:aws:s3:::{}/*"]}}]}}"#,
            self.bucket
        )
    }
}

fn transient<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Transient(err.to_string())
}

#[async_trait]
impl Store for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn ensure_bucket(&self) -> Result<()> {
        let head = self.client.head_bucket().bucket(&self.bucket).send().await;
        match head {
            Ok(_) => Ok(()),
            Err(err) if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) => {
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(transient)?;
                tracing::info!(bucket = self.bucket, "created bucket");
                Ok(())
            }
            Err(err) => Err(transient(err)),
        }
    }

    async fn set_public_read(&self) -> Result<()> {
        self.client
            .put_bucket_policy()
            .bucket(&self.bucket)
            .policy(self.anonymous_read_policy())
            .send()
            .await
            .map_err(transient)?;
        tracing::info!(bucket = self.bucket, "set public read policy");
        Ok(())
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectBody> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(svc) if svc.is_no_such_key() => StoreError::NotFound(key.to_string()),
                _ => transient(err),
            })?;
        Ok(ObjectBody {
            size: output.content_length().unwrap_or(0),
            reader: Box::pin(output.body.into_async_read()),
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(svc) if svc.is_not_found() => StoreError::NotFound(key.to_string()),
                _ => transient(err),
            })?;
        Ok(ObjectInfo {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(transient)?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0),
                });
            }
        }
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let objects = self.list(prefix).await?;
        let mut deleted = 0;
        // DeleteObjects accepts at most 1000 keys per request.
        for chunk in objects.chunks(1000) {
            let identifiers = chunk
                .iter()
                .map(|obj| {
                    ObjectIdentifier::builder()
                        .key(&obj.key)
                        .build()
                        .map_err(|e| StoreError::Invalid(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .build()
                .map_err(|e| StoreError::Invalid(e.to_string()))?;
            self.client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(transient)?;
            deleted += chunk.len();
        }
        Ok(deleted)
    }

    async fn download_to(&self, key: &str, dest: &Path) -> Result<()> {
        let mut body = self.get(key).await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(transient)?;
        }
        let mut file = tokio::fs::File::create(dest).await.map_err(transient)?;
        tokio::io::copy(&mut body.reader, &mut file)
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn copy_from(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_key: &str,
        content_type: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(format!("{src_bucket}/{src_key}"))
            .bucket(&self.bucket)
            .key(dst_key)
            .content_type(content_type)
            .metadata_directive(aws_sdk_s3::types::MetadataDirective::Replace)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(svc) if svc.meta().code() == Some("NoSuchKey") => {
                    StoreError::NotFound(format!("{src_bucket}/{src_key}"))
                }
                _ => transient(err),
            })?;
        Ok(())
    }
}
