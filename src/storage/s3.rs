use super::{ObjectEntry, ObjectStat, ObjectStore, ObjectStream};
use crate::{
    config::StorageConfig,
    error::{Error, Result},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{retry::RetryConfig, timeout::TimeoutConfig, Region},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client as S3Client,
};
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use std::time::Duration;
use tracing::{debug, info};

/// ListObjectsV2 never returns more than this many keys per page.
const MAX_PAGE_SIZE: usize = 1000;

/// S3 / MinIO backed store.
pub struct S3Store {
    client: S3Client,
    bucket: String,
    region: String,
}

fn storage_error(operation: &str, key: &str, err: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{} failed for {}: {}", operation, key, err))
}

impl S3Store {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let region = Region::new(config.region.clone());

        // Failures surface to the caller untouched, so the SDK must not retry.
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region.clone())
            .force_path_style(config.force_path_style)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(config.operation_timeout_secs))
                    .build(),
            );

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            builder = builder.credentials_provider(credentials);
        } else {
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            if let Some(provider) = sdk_config.credentials_provider() {
                builder = builder.credentials_provider(provider.clone());
            }
        }

        info!(
            bucket = %config.bucket,
            endpoint = ?config.endpoint,
            region = %config.region,
            "Configured S3 object store"
        );

        Ok(Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn bucket_exists(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(storage_error("head_bucket", &self.bucket, err))
                }
            }
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!(bucket = %self.bucket, "Created bucket");
                Ok(())
            }
            Err(e) => {
                let err = e.into_service_error();
                if err.is_bucket_already_owned_by_you() {
                    debug!(bucket = %self.bucket, "Bucket already owned by us");
                    Ok(())
                } else {
                    Err(storage_error("create_bucket", &self.bucket, err))
                }
            }
        }
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| storage_error("put_object", key, e.into_service_error()))?;

        debug!(key = %key, size, "Stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("get_object", key, e.into_service_error()))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| storage_error("get_object", key, e))?;
        Ok(data.into_bytes())
    }

    async fn stat_object(&self, key: &str) -> Result<Option<ObjectStat>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => Ok(Some(ObjectStat {
                size: response.content_length().unwrap_or(0).max(0) as u64,
                content_type: response.content_type().map(String::from),
            })),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(storage_error("head_object", key, err))
                }
            }
        }
    }

    async fn remove_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("delete_object", key, e.into_service_error()))?;

        debug!(key = %key, "Removed object");
        Ok(())
    }

    async fn copy_object(&self, source_key: &str, target_key: &str) -> Result<()> {
        let copy_source = format!("{}/{}", self.bucket, urlencoding::encode(source_key));
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source)
            .key(target_key)
            .send()
            .await
            .map_err(|e| storage_error("copy_object", source_key, e.into_service_error()))?;

        debug!(source = %source_key, target = %target_key, "Copied object");
        Ok(())
    }

    fn list_objects(&self, prefix: &str, recursive: bool, max_keys: Option<usize>) -> ObjectStream {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let prefix = prefix.to_string();
        let page_size = max_keys.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as i32;

        // State: Some(token) while pages remain, None once the listing is done.
        let pages = stream::try_unfold(Some(None::<String>), move |state| {
            let client = client.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();

            async move {
                let Some(token) = state else {
                    return Ok(None);
                };

                let mut request = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(&prefix)
                    .max_keys(page_size);
                if !recursive {
                    request = request.delimiter("/");
                }
                if let Some(token) = token {
                    request = request.continuation_token(token);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| storage_error("list_objects", &prefix, e.into_service_error()))?;

                let mut entries: Vec<ObjectEntry> = response
                    .contents()
                    .iter()
                    .filter_map(|object| {
                        object.key().map(|key| {
                            ObjectEntry::object(key, object.size().unwrap_or(0).max(0) as u64)
                        })
                    })
                    .collect();
                entries.extend(
                    response
                        .common_prefixes()
                        .iter()
                        .filter_map(|p| p.prefix())
                        .map(ObjectEntry::common_prefix),
                );

                let next = match response.next_continuation_token() {
                    Some(token) if response.is_truncated().unwrap_or(false) => {
                        Some(Some(token.to_string()))
                    }
                    _ => None,
                };

                Ok::<_, Error>(Some((entries, next)))
            }
        });

        let entries = pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten();

        match max_keys {
            Some(limit) => entries.take(limit).boxed(),
            None => entries.boxed(),
        }
    }
}
