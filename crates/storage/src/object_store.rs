use crate::error::{Result, StorageError};
use config::{Backend, Config, S3Config};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ClientOptions;
use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Create the object store selected by the storage configuration
pub fn create_object_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    match config.storage.backend {
        Backend::Local => create_local_store(&config.storage.path),
        Backend::S3 => create_s3_store(&config.s3),
    }
}

/// Create an object store rooted at a local directory
pub fn create_local_store(path: &str) -> Result<Arc<dyn ObjectStore>> {
    info!(path, "Using local backend");
    let store = LocalFileSystem::new_with_prefix(path)?;
    Ok(Arc::new(store))
}

/// Create an S3-compatible object store from configuration
///
/// Parameters:
/// - config: S3 configuration containing endpoint, bucket, credentials, etc.
///
/// Returns:
/// - Arc-wrapped ObjectStore configured according to the S3Config
pub fn create_s3_store(config: &S3Config) -> Result<Arc<dyn ObjectStore>> {
    // Configure HTTP client options with connection pool settings
    let client_options = ClientOptions::new()
        .with_pool_max_idle_per_host(config.pool_max_idle_per_host)
        .with_pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs));

    let mut builder = if config.use_env_credentials {
        // AWS environment credential chain (env vars, instance profiles, etc.)
        info!(bucket = %config.bucket, "Using AWS environment credential chain");
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_client_options(client_options);

        // AWS uses default regional endpoints unless one is given
        if !config.endpoint.is_empty() {
            builder = builder.with_endpoint(&config.endpoint);
        }
        builder
    } else {
        AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_client_options(client_options)
    };

    if config.allow_http {
        builder = builder.with_allow_http(true);
    }
    if let Some(token) = &config.session_token {
        builder = builder.with_token(token);
    }

    let store = builder
        .build()
        .map_err(|e| StorageError::Config(format!("Failed to build S3 object store: {}", e)))?;

    Ok(Arc::new(store))
}
