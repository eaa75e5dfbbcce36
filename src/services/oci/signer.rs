//! HTTP Signatures (`rsa-sha256`) as required by the OCI REST APIs.
//!
//! Every request signs `date`, `(request-target)` and `host`. Requests that
//! carry a JSON body additionally sign `content-length`, `content-type` and
//! `x-content-sha256`. Object uploads stream their body and are exempt from
//! body signing.

use super::credentials::OciCredentials;
use crate::services::storage::StorageError;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use reqwest::Method;
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, HOST, HeaderMap, HeaderName, HeaderValue,
};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};
use url::Url;

const REQUEST_TARGET: &str = "(request-target)";
const X_CONTENT_SHA256: HeaderName = HeaderName::from_static("x-content-sha256");

const GENERIC_HEADERS: &[&str] = &["date", REQUEST_TARGET, "host"];
const BODY_HEADERS: &[&str] = &[
    "date",
    REQUEST_TARGET,
    "host",
    "content-length",
    "content-type",
    "x-content-sha256",
];

pub struct RequestSigner {
    key_id: String,
    signing_key: SigningKey<Sha256>,
}

impl RequestSigner {
    pub fn new(credentials: &OciCredentials) -> Self {
        Self {
            key_id: credentials.key_id(),
            signing_key: SigningKey::<Sha256>::new(credentials.private_key().clone()),
        }
    }

    /// Adds `date`, `host`, the body headers when `body` is given, and the
    /// `authorization` header to `headers`. An existing `date` header is kept.
    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        headers: &mut HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<(), StorageError> {
        if !headers.contains_key(DATE) {
            let now = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            headers.insert(DATE, header_value(&now)?);
        }
        headers.insert(HOST, header_value(&host_header(url)?)?);

        let signed_headers = match body {
            Some(body) => {
                let digest = BASE64.encode(Sha256::digest(body));
                headers.insert(X_CONTENT_SHA256, header_value(&digest)?);
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    );
                }
                BODY_HEADERS
            }
            None => GENERIC_HEADERS,
        };

        let signing_string = signing_string(signed_headers, &request_target(method, url), headers)?;
        let signature = self.signing_key.sign(signing_string.as_bytes());

        let authorization = format!(
            "Signature version=\"1\",headers=\"{}\",keyId=\"{}\",algorithm=\"rsa-sha256\",signature=\"{}\"",
            signed_headers.join(" "),
            self.key_id,
            BASE64.encode(signature.to_bytes())
        );
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }
}

/// `post /n/ns/b/bucket/p/?x=y` style target: lowercase method, path and query.
pub fn request_target(method: &Method, url: &Url) -> String {
    let mut target = format!("{} {}", method.as_str().to_lowercase(), url.path());
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

pub fn signing_string(
    signed_headers: &[&str],
    request_target: &str,
    headers: &HeaderMap,
) -> Result<String, StorageError> {
    let lines = signed_headers
        .iter()
        .map(|name| {
            if *name == REQUEST_TARGET {
                return Ok(format!("{}: {}", REQUEST_TARGET, request_target));
            }
            let value = headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    StorageError::Client(format!("missing header '{}' for request signing", name))
                })?;
            Ok(format!("{}: {}", name, value))
        })
        .collect::<Result<Vec<_>, StorageError>>()?;
    Ok(lines.join("\n"))
}

fn host_header(url: &Url) -> Result<String, StorageError> {
    let host = url
        .host_str()
        .ok_or_else(|| StorageError::Client(format!("endpoint '{}' has no host", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn header_value(value: &str) -> Result<HeaderValue, StorageError> {
    HeaderValue::from_str(value).map_err(|e| StorageError::Client(e.to_string()))
}
