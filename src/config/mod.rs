use anyhow::{Result, anyhow, bail};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SHORTENER_ENDPOINT: &str = "https://tinyurl.ph/api/url/add";

/// Which object storage API the relay forwards uploads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Native OCI Object Storage API with pre-authenticated requests.
    Oci,
    /// Any S3-compatible endpoint (AWS, MinIO, OCI S3 compatibility).
    S3,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Oci => "oci",
            StorageBackend::S3 => "s3",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "oci" => Ok(StorageBackend::Oci),
            "s3" => Ok(StorageBackend::S3),
            other => Err(anyhow!("unknown STORAGE_BACKEND '{}' (expected 'oci' or 's3')", other)),
        }
    }
}

/// Process-wide configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Destination bucket (required)
    pub bucket_name: String,

    /// Object storage namespace (required for the OCI backend)
    pub namespace_name: String,

    /// Bearer token for the link shortener API (required)
    pub tiny_url_api: String,

    /// Link shortener endpoint (default: tinyurl.ph)
    pub shortener_endpoint: String,

    /// Respond with the long signed URL when shortening fails (default: false)
    pub shortener_fallback: bool,

    /// Storage backend: "oci" or "s3" (default: "oci")
    pub storage_backend: StorageBackend,

    /// OCI CLI config file (default: ~/.oci/config)
    pub oci_config_file: PathBuf,

    /// Profile inside the OCI config file (default: "DEFAULT")
    pub oci_profile: String,

    /// Region override; the profile's region is used otherwise
    pub oci_region: Option<String>,

    /// API endpoint override for the OCI backend
    pub oci_storage_endpoint: Option<String>,

    /// S3-compatible endpoint (e.g. MinIO); AWS default resolution when unset
    pub s3_endpoint: Option<String>,

    /// S3 region (default: "us-east-1")
    pub s3_region: String,

    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,

    /// Label given to each pre-authenticated request (default: "PreAuthRequest")
    pub par_name: String,

    /// Lifetime of the expiration metadata and of the signed URL (default: 15 minutes)
    pub object_ttl: Duration,

    /// Maximum file size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Directory for staged uploads (default: system temp dir)
    pub staging_dir: PathBuf,

    /// Timeout applied to each outbound call (default: 30s)
    pub upstream_timeout: Duration,

    /// Timeout for a whole request, including the inbound upload (default: 15 minutes)
    pub request_timeout: Duration,

    /// Allowed CORS origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bucket_name: String::new(),
            namespace_name: String::new(),
            tiny_url_api: String::new(),
            shortener_endpoint: DEFAULT_SHORTENER_ENDPOINT.to_string(),
            shortener_fallback: false,
            storage_backend: StorageBackend::Oci,
            oci_config_file: PathBuf::from(".oci/config"),
            oci_profile: "DEFAULT".to_string(),
            oci_region: None,
            oci_storage_endpoint: None,
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            par_name: "PreAuthRequest".to_string(),
            object_ttl: Duration::from_secs(15 * 60),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            staging_dir: env::temp_dir(),
            upstream_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(900),
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let home = var("HOME");

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(v) => v.parse()?,
            None => default.storage_backend,
        };

        let config = Self {
            bucket_name: var("BUCKET_NAME").unwrap_or_default(),
            namespace_name: var("NAMESPACE_NAME").unwrap_or_default(),
            tiny_url_api: var("TINY_URL_API").unwrap_or_default(),

            shortener_endpoint: var("SHORTENER_ENDPOINT").unwrap_or(default.shortener_endpoint),

            shortener_fallback: var("SHORTENER_FALLBACK")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.shortener_fallback),

            storage_backend,

            oci_config_file: match var("OCI_CONFIG_FILE") {
                Some(path) => expand_home(&path, home.as_deref()),
                None => expand_home("~/.oci/config", home.as_deref()),
            },

            oci_profile: var("OCI_CLI_PROFILE").unwrap_or(default.oci_profile),
            oci_region: var("OCI_REGION"),
            oci_storage_endpoint: var("OCI_STORAGE_ENDPOINT"),

            s3_endpoint: var("S3_ENDPOINT"),
            s3_region: var("S3_REGION").unwrap_or(default.s3_region),
            s3_access_key_id: var("S3_ACCESS_KEY_ID"),
            s3_secret_access_key: var("S3_SECRET_ACCESS_KEY"),

            par_name: var("PAR_NAME").unwrap_or(default.par_name),

            object_ttl: parse_secs(var("OBJECT_TTL_SECS")).unwrap_or(default.object_ttl),

            max_file_size: var("MAX_FILE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            staging_dir: var("STAGING_DIR")
                .map(|p| expand_home(&p, home.as_deref()))
                .unwrap_or(default.staging_dir),

            upstream_timeout: parse_secs(var("UPSTREAM_TIMEOUT_SECS"))
                .unwrap_or(default.upstream_timeout),

            request_timeout: parse_secs(var("REQUEST_TIMEOUT_SECS"))
                .unwrap_or(default.request_timeout),

            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_name.is_empty() {
            bail!("BUCKET_NAME must be set");
        }
        if self.tiny_url_api.is_empty() {
            bail!("TINY_URL_API must be set");
        }
        match self.storage_backend {
            StorageBackend::Oci if self.namespace_name.is_empty() => {
                bail!("NAMESPACE_NAME must be set for the OCI storage backend");
            }
            StorageBackend::S3
                if self.s3_access_key_id.is_none() || self.s3_secret_access_key.is_none() =>
            {
                bail!("S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set for the S3 storage backend");
            }
            _ => {}
        }
        if self.object_ttl.is_zero() {
            bail!("OBJECT_TTL_SECS must be greater than zero");
        }
        Ok(())
    }
}

fn parse_secs(value: Option<String>) -> Option<Duration> {
    value
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn expand_home(path: &str, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}
