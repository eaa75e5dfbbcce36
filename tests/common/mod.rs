#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use file_relay::config::AppConfig;
use file_relay::services::shortener::{LinkShortener, ShortenerError};
use file_relay::services::storage::{ObjectStorage, StorageError, StorageTarget};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

pub fn test_config(staging_dir: &Path) -> AppConfig {
    AppConfig {
        bucket_name: "uploads".to_string(),
        namespace_name: "relayns".to_string(),
        tiny_url_api: "test-token".to_string(),
        staging_dir: staging_dir.to_path_buf(),
        ..AppConfig::default()
    }
}

pub fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    multipart_parts(&[(field, Some(filename), content)])
}

/// Multipart body with one part per `(field, filename, content)`, in order.
pub fn multipart_parts(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, content) in parts {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{field}\"; filename=\"{filename}\""),
            None => format!("form-data; name=\"{field}\""),
        };
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                Content-Disposition: {disposition}\r\n\
                Content-Type: text/plain\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub target: StorageTarget,
    pub staged_path: PathBuf,
    pub bytes: Vec<u8>,
    pub size: u64,
    pub expires_at: DateTime<Utc>,
}

/// In-memory object storage that records what it was asked to do.
#[derive(Default)]
pub struct FakeStorage {
    pub region: String,
    pub fail_upload: bool,
    pub fail_sign: bool,
    pub delay: Option<Duration>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub signed: Mutex<Vec<StorageTarget>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self {
            region: "us-ashburn-1".to_string(),
            ..Self::default()
        }
    }

    pub fn failing_upload() -> Self {
        Self {
            fail_upload: true,
            ..Self::new()
        }
    }

    pub fn failing_sign() -> Self {
        Self {
            fail_sign: true,
            ..Self::new()
        }
    }

    /// Stalls every upload for `delay` after recording it.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn signed(&self) -> Vec<StorageTarget> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    async fn put_object(
        &self,
        target: &StorageTarget,
        source: &Path,
        size: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;
        self.uploads.lock().unwrap().push(RecordedUpload {
            target: target.clone(),
            staged_path: source.to_path_buf(),
            bytes,
            size,
            expires_at,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_upload {
            return Err(StorageError::Upload("503 Service Unavailable".to_string()));
        }
        Ok(())
    }

    async fn create_download_url(
        &self,
        target: &StorageTarget,
        _expires_at: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        self.signed.lock().unwrap().push(target.clone());
        if self.fail_sign {
            return Err(StorageError::PreAuth("404 BucketNotFound".to_string()));
        }
        Ok(format!(
            "https://objectstorage.{}.oraclecloud.com/p/tok123/n/{}/b/{}/o/{}",
            self.region, target.namespace, target.bucket, target.object_name
        ))
    }
}

pub enum ShortenBehavior {
    Succeed(String),
    Status(StatusCode),
    Malformed,
}

pub struct FakeShortener {
    behavior: ShortenBehavior,
    pub calls: Mutex<Vec<String>>,
}

impl FakeShortener {
    pub fn new(behavior: ShortenBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(short_url: &str) -> Self {
        Self::new(ShortenBehavior::Succeed(short_url.to_string()))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkShortener for FakeShortener {
    async fn shorten(&self, long_url: &str) -> Result<String, ShortenerError> {
        self.calls.lock().unwrap().push(long_url.to_string());
        match &self.behavior {
            ShortenBehavior::Succeed(url) => Ok(url.clone()),
            ShortenBehavior::Status(status) => Err(ShortenerError::Status(*status)),
            ShortenBehavior::Malformed => Err(ShortenerError::Parse(
                "expected value at line 1 column 1".to_string(),
            )),
        }
    }
}
