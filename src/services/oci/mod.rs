pub mod credentials;
pub mod signer;

use crate::services::storage::{
    EXPIRATION_METADATA_KEY, ObjectStorage, StorageError, StorageTarget, format_expiration,
    transfer_timeout,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use credentials::OciCredentials;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};
use signer::RequestSigner;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use url::Url;

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Public host for a region; pre-authenticated URLs are always rooted here.
pub fn regional_endpoint(region: &str) -> String {
    format!("https://objectstorage.{}.oraclecloud.com", region)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePreauthenticatedRequestDetails<'a> {
    name: &'a str,
    object_name: &'a str,
    access_type: &'static str,
    time_expires: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreauthenticatedRequest {
    access_uri: String,
}

/// Native OCI Object Storage client: PutObject and CreatePreauthenticatedRequest.
pub struct OciObjectStorage {
    http: reqwest::Client,
    signer: RequestSigner,
    endpoint: Url,
    region: String,
    par_name: String,
    timeout: Duration,
}

impl OciObjectStorage {
    /// `endpoint` overrides the regional API host; the region still decides
    /// the host of issued download URLs.
    pub fn new(
        credentials: &OciCredentials,
        endpoint: Option<&str>,
        par_name: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let region = credentials.region.trim().to_string();
        if region.is_empty() {
            return Err(StorageError::Region(
                "no region configured for the OCI profile".to_string(),
            ));
        }

        let endpoint = endpoint
            .map(str::to_string)
            .unwrap_or_else(|| regional_endpoint(&region));
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| StorageError::Client(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;

        Ok(Self {
            http,
            signer: RequestSigner::new(credentials),
            endpoint,
            region,
            par_name: par_name.to_string(),
            timeout,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn url(&self, path: &str) -> Result<Url, StorageError> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path)).map_err(|e| StorageError::Client(e.to_string()))
    }

    fn bucket_path(target: &StorageTarget) -> String {
        format!(
            "/n/{}/b/{}",
            utf8_percent_encode(&target.namespace, PATH_SEGMENT),
            utf8_percent_encode(&target.bucket, PATH_SEGMENT)
        )
    }

    fn object_path(target: &StorageTarget) -> String {
        format!(
            "{}/o/{}",
            Self::bucket_path(target),
            utf8_percent_encode(&target.object_name, PATH_SEGMENT)
        )
    }
}

async fn error_detail(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.is_empty() => format!("{}: {}", status, body),
        _ => status.to_string(),
    }
}

fn map_send_error(
    operation: &'static str,
    timeout: Duration,
    err: reqwest::Error,
    wrap: fn(String) -> StorageError,
) -> StorageError {
    if err.is_timeout() {
        StorageError::Timeout {
            operation,
            after: timeout,
        }
    } else {
        wrap(err.to_string())
    }
}

#[async_trait]
impl ObjectStorage for OciObjectStorage {
    fn backend_name(&self) -> &'static str {
        "oci"
    }

    async fn put_object(
        &self,
        target: &StorageTarget,
        source: &Path,
        size: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let url = self.url(&Self::object_path(target))?;
        let file = tokio::fs::File::open(source)
            .await
            .map_err(|e| StorageError::Upload(format!("cannot open staged file: {}", e)))?;

        let metadata_header = HeaderName::try_from(format!(
            "opc-meta-{}",
            EXPIRATION_METADATA_KEY.to_lowercase()
        ))
        .map_err(|e| StorageError::Client(e.to_string()))?;
        let expiration = HeaderValue::from_str(&format_expiration(expires_at))
            .map_err(|e| StorageError::Client(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        headers.insert(metadata_header, expiration);
        self.signer.sign(&Method::PUT, &url, &mut headers, None)?;

        let timeout = transfer_timeout(self.timeout, size);
        tracing::debug!("PUT {} ({} bytes, timeout {:?})", url, size, timeout);
        let response = self
            .http
            .put(url)
            .headers(headers)
            .timeout(timeout)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| map_send_error("PutObject", timeout, e, StorageError::Upload))?;

        if !response.status().is_success() {
            return Err(StorageError::Upload(error_detail(response).await));
        }
        Ok(())
    }

    async fn create_download_url(
        &self,
        target: &StorageTarget,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let url = self.url(&format!("{}/p/", Self::bucket_path(target)))?;
        let details = CreatePreauthenticatedRequestDetails {
            name: &self.par_name,
            object_name: &target.object_name,
            access_type: "ObjectRead",
            time_expires: expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let body = serde_json::to_vec(&details).map_err(|e| StorageError::PreAuth(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.signer.sign(&Method::POST, &url, &mut headers, Some(&body))?;

        tracing::debug!("POST {}", url);
        let response = self
            .http
            .post(url)
            .headers(headers)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                map_send_error(
                    "CreatePreauthenticatedRequest",
                    self.timeout,
                    e,
                    StorageError::PreAuth,
                )
            })?;

        if !response.status().is_success() {
            return Err(StorageError::PreAuth(error_detail(response).await));
        }

        let par: PreauthenticatedRequest = response
            .json()
            .await
            .map_err(|e| StorageError::Parse(e.to_string()))?;

        Ok(format!("{}{}", regional_endpoint(&self.region), par.access_uri))
    }
}
