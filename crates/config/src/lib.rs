use anyhow::{Context, Result};
use config_rs::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Which backend holds the blocks
    #[serde(default)]
    pub storage: StorageConfig,

    /// S3 storage configuration
    #[serde(default)]
    pub s3: S3Config,

    /// Block analysis settings
    #[serde(default)]
    pub analyse: AnalyseConfig,
}

/// Backend kind for block storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Local,
    S3,
}

/// Block storage selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind: "local" or "s3" (default: local)
    #[serde(default)]
    pub backend: Backend,

    /// Root directory of a local backend, containing <tenant>/<block> folders
    #[serde(default = "default_local_path")]
    pub path: String,
}

/// Configuration for S3-compatible object storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 endpoint URL (e.g., "http://localhost:9000")
    /// Optional - if not provided, uses AWS SDK default endpoint for the region
    #[serde(default)]
    pub endpoint: String,

    /// S3 bucket name (e.g., "tempo")
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Prefix/path within the bucket (e.g., "traces")
    #[serde(default)]
    pub prefix: String,

    /// AWS region (required but ignored by Minio)
    #[serde(default = "default_region")]
    pub region: String,

    /// S3 access key ID
    #[serde(default)]
    pub access_key_id: String,

    /// S3 secret access key
    #[serde(default)]
    pub secret_access_key: String,

    /// S3 session token (optional, for temporary credentials)
    #[serde(default)]
    pub session_token: Option<String>,

    /// Allow HTTP connections (true for Minio, false for AWS S3)
    #[serde(default)]
    pub allow_http: bool,

    /// Use AWS environment credentials via AmazonS3Builder::from_env()
    /// When true, uses AWS credential chain (env vars, instance profiles, etc.)
    #[serde(default)]
    pub use_env_credentials: bool,

    /// Maximum number of idle connections per host (default: 30)
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// Pool idle timeout in seconds (default: 120)
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
}

/// Settings for block scans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyseConfig {
    /// Size in bytes of each buffered read window (default: 2 MiB)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u64,

    /// Number of read windows kept per block (default: 64)
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,

    /// Number of blocks scanned in parallel (default: 10)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Number of attributes printed per scope (default: 15)
    #[serde(default = "default_num_attr")]
    pub num_attr: usize,
}

// Default value functions
fn default_local_path() -> String {
    "/var/tempo/traces".to_string()
}

fn default_bucket() -> String {
    "tempo".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_pool_max_idle_per_host() -> usize {
    30
}

fn default_pool_idle_timeout() -> u64 {
    120
}

fn default_buffer_size() -> u64 {
    2 * 1024 * 1024
}

fn default_buffer_count() -> usize {
    64
}

fn default_concurrency() -> usize {
    10
}

fn default_num_attr() -> usize {
    15
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            path: default_local_path(),
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket: default_bucket(),
            prefix: String::new(),
            region: default_region(),
            access_key_id: "tempo".to_string(),
            secret_access_key: "supersecret".to_string(),
            session_token: None,
            allow_http: true,
            use_env_credentials: false,
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
        }
    }
}

impl Default for AnalyseConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            buffer_count: default_buffer_count(),
            concurrency: default_concurrency(),
            num_attr: default_num_attr(),
        }
    }
}

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. TOML file (if provided)
    /// 3. Environment variables (STORAGE_*, S3_* and ANALYSE_* prefixes)
    /// 4. Explicit AWS credentials from environment (fallback for empty credentials)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let defaults =
            ConfigBuilder::try_from(&Config::default()).context("Failed to encode default configuration")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(file_path) = config_file {
            let path = Path::new(file_path);
            anyhow::ensure!(path.exists(), "Configuration file not found: {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        // e.g. S3_BUCKET or ANALYSE_CONCURRENCY. Keys containing underscores
        // (buffer_size) are only reachable through the file.
        for prefix in ["STORAGE", "S3", "ANALYSE"] {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator("_")
                    .try_parsing(true)
                    .keep_prefix(true),
            );
        }

        let mut config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize::<Config>())
            .context("Failed to build configuration")?;
        config.s3.apply_aws_env();
        Ok(config)
    }

    /// Load Config from a TOML file
    ///
    /// Environment variables can still override values from the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path
            .as_ref()
            .to_str()
            .context("Configuration path is not valid UTF-8")?;
        Self::load(Some(path))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.storage.backend {
            Backend::Local => self.storage.validate()?,
            Backend::S3 => self.s3.validate()?,
        }
        self.analyse.validate()?;
        Ok(())
    }
}

impl StorageConfig {
    /// Validate the local backend configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.path.is_empty(), "Local storage path cannot be empty");
        Ok(())
    }
}

impl S3Config {
    /// Fills credentials left empty from the standard AWS_* variables
    fn apply_aws_env(&mut self) {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        if self.access_key_id.is_empty() {
            self.access_key_id = env("AWS_ACCESS_KEY_ID").unwrap_or_default();
        }
        if self.secret_access_key.is_empty() {
            self.secret_access_key = env("AWS_SECRET_ACCESS_KEY").unwrap_or_default();
        }
        if self.session_token.is_none() {
            self.session_token = env("AWS_SESSION_TOKEN");
        }
    }

    /// Validate the S3 configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.bucket.is_empty(), "S3 bucket cannot be empty");

        // If not using env credentials, validate that credentials are provided
        if !self.use_env_credentials {
            anyhow::ensure!(
                !self.endpoint.is_empty(),
                "S3 endpoint cannot be empty (unless use_env_credentials=true)"
            );
            anyhow::ensure!(
                !self.access_key_id.is_empty(),
                "S3 access key ID cannot be empty (unless use_env_credentials=true)"
            );
            anyhow::ensure!(
                !self.secret_access_key.is_empty(),
                "S3 secret access key cannot be empty (unless use_env_credentials=true)"
            );
        }

        Ok(())
    }
}

impl AnalyseConfig {
    /// Validate the analysis settings
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.buffer_size > 0, "Analyse buffer size must be positive");
        anyhow::ensure!(self.buffer_count > 0, "Analyse buffer count must be positive");
        anyhow::ensure!(self.concurrency > 0, "Analyse concurrency must be positive");
        Ok(())
    }
}
