use crate::config::{AppConfig, StorageBackend};
use crate::services::oci::OciObjectStorage;
use crate::services::oci::credentials::OciCredentials;
use crate::services::storage::{ObjectStorage, S3ObjectStorage};
use anyhow::{Context, Result, anyhow};
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> Result<Arc<dyn ObjectStorage>> {
    match config.storage_backend {
        StorageBackend::Oci => {
            let mut credentials =
                OciCredentials::from_config_file(&config.oci_config_file, &config.oci_profile)
                    .context("failed to load OCI credentials")?;
            if let Some(region) = &config.oci_region {
                credentials.region = region.clone();
            }
            setup_oci_storage(config, &credentials)
        }
        StorageBackend::S3 => setup_s3_storage(config).await,
    }
}

/// Build the OCI backend from explicit credentials.
pub fn setup_oci_storage(
    config: &AppConfig,
    credentials: &OciCredentials,
) -> Result<Arc<dyn ObjectStorage>> {
    let storage = OciObjectStorage::new(
        credentials,
        config.oci_storage_endpoint.as_deref(),
        &config.par_name,
        config.upstream_timeout,
    )?;

    info!(
        "☁️  OCI Object Storage: region {} (Namespace: {}, Bucket: {})",
        storage.region(),
        config.namespace_name,
        config.bucket_name
    );

    Ok(Arc::new(storage))
}

async fn setup_s3_storage(config: &AppConfig) -> Result<Arc<dyn ObjectStorage>> {
    let access_key = config
        .s3_access_key_id
        .clone()
        .ok_or_else(|| anyhow!("S3_ACCESS_KEY_ID must be set"))?;
    let secret_key = config
        .s3_secret_access_key
        .clone()
        .ok_or_else(|| anyhow!("S3_SECRET_ACCESS_KEY must be set"))?;

    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        config.s3_endpoint.as_deref().unwrap_or("default endpoint"),
        config.bucket_name
    );

    let mut loader = aws_config::from_env()
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(Credentials::new(
            access_key, secret_key, None, None, "static",
        ));
    if let Some(endpoint_url) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint_url);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Ok(Arc::new(S3ObjectStorage::new(
        s3_client,
        config.upstream_timeout,
    )))
}
