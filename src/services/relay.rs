use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::services::shortener::LinkShortener;
use crate::services::staging::StagedFile;
use crate::services::storage::{ObjectStorage, StorageTarget};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub target: StorageTarget,
    /// Short link, or the download URL itself when shortening failed and
    /// fallback is enabled.
    pub link: String,
    pub shortened: bool,
}

/// Upload → sign → shorten, for one staged file.
pub struct RelayService {
    storage: Arc<dyn ObjectStorage>,
    shortener: Arc<dyn LinkShortener>,
    namespace: String,
    bucket: String,
    object_ttl: TimeDelta,
    fallback_to_long_url: bool,
}

impl RelayService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        shortener: Arc<dyn LinkShortener>,
        config: &AppConfig,
    ) -> Result<Self, AppError> {
        let object_ttl = i64::try_from(config.object_ttl.as_secs())
            .ok()
            .and_then(TimeDelta::try_seconds)
            .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
            .ok_or_else(|| AppError::Configuration("object TTL is out of range".to_string()))?;

        Ok(Self {
            storage,
            shortener,
            namespace: config.namespace_name.clone(),
            bucket: config.bucket_name.clone(),
            object_ttl,
            fallback_to_long_url: config.shortener_fallback,
        })
    }

    pub fn storage_backend(&self) -> &'static str {
        self.storage.backend_name()
    }

    pub fn target_for(&self, staged: &StagedFile) -> StorageTarget {
        StorageTarget {
            namespace: self.namespace.clone(),
            bucket: self.bucket.clone(),
            object_name: staged.object_name().to_string(),
        }
    }

    fn expiry(&self) -> DateTime<Utc> {
        Utc::now() + self.object_ttl
    }

    pub async fn relay(&self, staged: &StagedFile) -> Result<RelayOutcome, AppError> {
        let target = self.target_for(staged);

        info!(
            "Uploading '{}' ({} bytes) to {}/{} as {}",
            staged.original_name(),
            staged.size(),
            target.namespace,
            target.bucket,
            target.object_name
        );
        self.storage
            .put_object(&target, staged.path(), staged.size(), self.expiry())
            .await?;

        let download_url = self.storage.create_download_url(&target, self.expiry()).await?;
        info!("Issued download URL for {}", target.object_name);

        let shortening = self.shortener.shorten(&download_url).await;
        let (link, shortened) = match shortening {
            Ok(short) => (short, true),
            Err(e) if self.fallback_to_long_url => {
                warn!("Shortening failed, answering with the long URL: {}", e);
                (download_url, false)
            }
            Err(e) => return Err(e.into()),
        };

        Ok(RelayOutcome {
            target,
            link,
            shortened,
        })
    }
}
