use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, SecondsFormat, Utc};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Metadata key recording when an object may be discarded. Advisory only.
pub const EXPIRATION_METADATA_KEY: &str = "expirationTime";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create Object Storage client: {0}")]
    Client(String),

    #[error("Failed to get region: {0}")]
    Region(String),

    #[error("Failed to upload file: {0}")]
    Upload(String),

    #[error("Failed to create pre-authenticated request: {0}")]
    PreAuth(String),

    #[error("Object storage {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Failed to parse object storage response: {0}")]
    Parse(String),
}

/// Where an object lives. Built once per request so upload and signing agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    pub namespace: String,
    pub bucket: String,
    pub object_name: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Short name reported by the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Stream the file at `source` into the target object, tagging it with
    /// `expires_at` as expiration metadata.
    async fn put_object(
        &self,
        target: &StorageTarget,
        source: &Path,
        size: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Issue a credential-free, read-only URL for the object valid until `expires_at`.
    async fn create_download_url(
        &self,
        target: &StorageTarget,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StorageError>;
}

/// Slowest upload throughput tolerated before a transfer is treated as stalled.
const MIN_TRANSFER_BYTES_PER_SEC: u64 = 512 * 1024;

/// Time allowed for uploading `size` bytes: `base` plus the time the body
/// takes at the minimum tolerated throughput.
pub fn transfer_timeout(base: Duration, size: u64) -> Duration {
    base.saturating_add(Duration::from_secs(size / MIN_TRANSFER_BYTES_PER_SEC))
}

pub fn format_expiration(expires_at: DateTime<Utc>) -> String {
    expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| StorageError::Timeout { operation, after })?
}

/// S3-compatible backend (AWS, MinIO, OCI's S3 compatibility API).
pub struct S3ObjectStorage {
    client: Client,
    timeout: Duration,
}

impl S3ObjectStorage {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn put_object(
        &self,
        target: &StorageTarget,
        source: &Path,
        size: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StorageError::Upload(format!("cannot read staged file: {}", e)))?;

        with_timeout("PutObject", transfer_timeout(self.timeout, size), async {
            self.client
                .put_object()
                .bucket(&target.bucket)
                .key(&target.object_name)
                .content_type(mime::APPLICATION_OCTET_STREAM.to_string())
                .content_length(size as i64)
                .metadata(EXPIRATION_METADATA_KEY, format_expiration(expires_at))
                .body(body)
                .send()
                .await
                .map_err(|e| StorageError::Upload(DisplayErrorContext(&e).to_string()))?;
            Ok(())
        })
        .await
    }

    async fn create_download_url(
        &self,
        target: &StorageTarget,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let expires_in = (expires_at - Utc::now())
            .to_std()
            .map_err(|_| StorageError::PreAuth("expiry is in the past".to_string()))?;

        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Client(e.to_string()))?;

        let presigned = with_timeout("PresignGetObject", self.timeout, async {
            self.client
                .get_object()
                .bucket(&target.bucket)
                .key(&target.object_name)
                .presigned(presigning_config)
                .await
                .map_err(|e| StorageError::PreAuth(DisplayErrorContext(&e).to_string()))
        })
        .await?;

        Ok(presigned.uri().to_string())
    }
}
