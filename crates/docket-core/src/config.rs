//! Configuration module
//!
//! Configuration is read from the environment once at startup, validated, and then
//! handed out as one explicit object per collaborator (upload policy, storage,
//! repository, event bus, worker). Nothing below the API setup reads the environment.

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

// Common constants
const DEFAULT_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: usize = 50;
const MAX_BATCH_FILES: usize = 100;
const DEFAULT_ALLOWED_EXTENSIONS: &str = "pdf,jpg,jpeg,png";
const DEFAULT_ALLOWED_CONTENT_TYPES: &str = "application/pdf,image/jpeg,image/jpg,image/png";
const DEFAULT_UPLOADED_BY: &str = "anonymous";
const DEFAULT_EVENT_CHANNEL: &str = "document_changed";
const WORKER_MAX_CONCURRENCY: usize = 4;
const WORKER_SWEEP_INTERVAL_SECS: u64 = 60;
const WORKER_SWEEP_BATCH: i64 = 100;

/// Base configuration for the HTTP process
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
}

/// Limits applied to every upload batch before any side effect.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    pub max_file_size_bytes: usize,
    pub max_batch_files: usize,
    /// Lowercase, without leading dot.
    pub allowed_extensions: Vec<String>,
    /// Lowercase MIME types without parameters.
    pub allowed_content_types: Vec<String>,
    pub default_uploaded_by: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_batch_files: MAX_BATCH_FILES,
            allowed_extensions: parse_list(DEFAULT_ALLOWED_EXTENSIONS),
            allowed_content_types: parse_list(DEFAULT_ALLOWED_CONTENT_TYPES),
            default_uploaded_by: DEFAULT_UPLOADED_BY.to_string(),
        }
    }
}

impl UploadPolicy {
    pub fn max_file_size_mb(&self) -> usize {
        self.max_file_size_bytes / (1024 * 1024)
    }
}

/// Which optional stages run, and which ones gate `Finished`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessingFlags {
    pub ocr_enabled: bool,
    pub extraction_enabled: bool,
    pub ocr_required: bool,
    pub extraction_required: bool,
}

impl ProcessingFlags {
    /// Flags where every enabled stage is also required.
    pub fn new(ocr_enabled: bool, extraction_enabled: bool) -> Self {
        Self {
            ocr_enabled,
            extraction_enabled,
            ocr_required: ocr_enabled,
            extraction_required: extraction_enabled,
        }
    }
}

impl Default for ProcessingFlags {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// Storage backend settings passed to the storage factory.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers.
    pub endpoint: Option<String>,
    /// Service account file for GCS.
    pub credentials_path: Option<String>,
    pub local_path: Option<String>,
    pub local_base_url: Option<String>,
}

impl StorageConfig {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: None,
            region: None,
            endpoint: None,
            credentials_path: None,
            local_path: Some(path.into()),
            local_base_url: None,
        }
    }

    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            bucket: None,
            region: None,
            endpoint: None,
            credentials_path: None,
            local_path: None,
            local_base_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.backend {
            StorageBackend::Gcs => {
                if self.bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BUCKET must be set when using GCS storage backend"
                    ));
                }
            }
            StorageBackend::S3 => {
                if self.bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.region.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepositoryBackend {
    Postgres,
    Memory,
}

impl FromStr for RepositoryBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(RepositoryBackend::Postgres),
            "memory" => Ok(RepositoryBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid repository backend: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RepositoryConfig {
    pub backend: RepositoryBackend,
    pub database_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventBusBackend {
    Postgres,
    Memory,
}

impl FromStr for EventBusBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(EventBusBackend::Postgres),
            "memory" => Ok(EventBusBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid event bus backend: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventBusConfig {
    pub backend: EventBusBackend,
    /// LISTEN/NOTIFY channel for the Postgres bus.
    pub channel: String,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            backend: EventBusBackend::Memory,
            channel: DEFAULT_EVENT_CHANNEL.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub finalizer_enabled: bool,
    pub max_concurrency: usize,
    /// Interval between sweeps of documents still processing. 0 = disabled.
    pub sweep_interval_secs: u64,
    pub sweep_batch: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            finalizer_enabled: true,
            max_concurrency: WORKER_MAX_CONCURRENCY,
            sweep_interval_secs: WORKER_SWEEP_INTERVAL_SECS,
            sweep_batch: WORKER_SWEEP_BATCH,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DocketConfig {
    pub base: BaseConfig,
    pub upload: UploadPolicy,
    pub processing: ProcessingFlags,
    pub storage: StorageConfig,
    pub repository: RepositoryConfig,
    pub event_bus: EventBusConfig,
    pub worker: WorkerConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<DocketConfig>);

impl Config {
    fn inner(&self) -> &DocketConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = DocketConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().repository.database_url.as_deref()
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.inner().upload
    }

    pub fn processing_flags(&self) -> ProcessingFlags {
        self.inner().processing
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.inner().storage
    }

    pub fn repository(&self) -> &RepositoryConfig {
        &self.inner().repository
    }

    pub fn event_bus(&self) -> &EventBusConfig {
        &self.inner().event_bus
    }

    pub fn worker(&self) -> &WorkerConfig {
        &self.inner().worker
    }

    /// Largest request body accepted by the upload route: a full batch plus multipart overhead.
    pub fn max_request_body_bytes(&self) -> usize {
        let upload = &self.inner().upload;
        upload
            .max_file_size_bytes
            .saturating_mul(upload.max_batch_files)
            .saturating_add(1024 * 1024)
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Split a comma separated list, lowercasing and dropping empty entries.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .to_lowercase()
        .parse()
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl DocketConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
        };

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let upload = UploadPolicy {
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            max_batch_files: env::var("MAX_BATCH_FILES")
                .unwrap_or_else(|_| MAX_BATCH_FILES.to_string())
                .parse()
                .unwrap_or(MAX_BATCH_FILES),
            allowed_extensions: parse_list(
                &env::var("ALLOWED_EXTENSIONS")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_EXTENSIONS.to_string()),
            ),
            allowed_content_types: parse_list(
                &env::var("ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_CONTENT_TYPES.to_string()),
            ),
            default_uploaded_by: env_opt("DEFAULT_UPLOADED_BY")
                .unwrap_or_else(|| DEFAULT_UPLOADED_BY.to_string()),
        };

        let ocr_enabled = env_flag("OCR_ENABLED", true);
        let extraction_enabled = env_flag("EXTRACTION_ENABLED", true);
        let processing = ProcessingFlags {
            ocr_enabled,
            extraction_enabled,
            ocr_required: env_flag("OCR_REQUIRED", ocr_enabled),
            extraction_required: env_flag("EXTRACTION_REQUIRED", extraction_enabled),
        };

        let storage = StorageConfig {
            backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "local".to_string())
                .parse()?,
            bucket: env_opt("STORAGE_BUCKET"),
            region: env_opt("STORAGE_REGION").or_else(|| env_opt("AWS_REGION")),
            endpoint: env_opt("STORAGE_ENDPOINT"),
            credentials_path: env_opt("GOOGLE_APPLICATION_CREDENTIALS"),
            local_path: env_opt("LOCAL_STORAGE_PATH"),
            local_base_url: env_opt("LOCAL_STORAGE_BASE_URL"),
        };

        let repository = RepositoryConfig {
            backend: env::var("REPOSITORY_BACKEND")
                .unwrap_or_else(|_| "postgres".to_string())
                .parse()?,
            database_url: env_opt("DATABASE_URL"),
        };

        let event_bus = EventBusConfig {
            backend: env::var("EVENT_BUS_BACKEND")
                .unwrap_or_else(|_| "postgres".to_string())
                .parse()?,
            channel: env_opt("EVENT_CHANNEL").unwrap_or_else(|| DEFAULT_EVENT_CHANNEL.to_string()),
        };

        let worker = WorkerConfig {
            finalizer_enabled: env_flag("FINALIZER_ENABLED", true),
            max_concurrency: env::var("WORKER_MAX_CONCURRENCY")
                .unwrap_or_else(|_| WORKER_MAX_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(WORKER_MAX_CONCURRENCY),
            sweep_interval_secs: env::var("WORKER_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| WORKER_SWEEP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(WORKER_SWEEP_INTERVAL_SECS),
            sweep_batch: env::var("WORKER_SWEEP_BATCH")
                .unwrap_or_else(|_| WORKER_SWEEP_BATCH.to_string())
                .parse()
                .unwrap_or(WORKER_SWEEP_BATCH),
        };

        let config = DocketConfig {
            base,
            upload,
            processing,
            storage,
            repository,
            event_bus,
            worker,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if is_production_env(&self.base.environment)
            && self.base.cors_origins.iter().any(|o| o == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.upload.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.upload.max_batch_files == 0 {
            return Err(anyhow::anyhow!("MAX_BATCH_FILES must be greater than 0"));
        }
        if self.upload.allowed_extensions.is_empty() || self.upload.allowed_content_types.is_empty()
        {
            return Err(anyhow::anyhow!(
                "ALLOWED_EXTENSIONS and ALLOWED_CONTENT_TYPES must not be empty"
            ));
        }

        if self.processing.ocr_required && !self.processing.ocr_enabled {
            return Err(anyhow::anyhow!(
                "OCR_REQUIRED=true requires OCR_ENABLED=true"
            ));
        }
        if self.processing.extraction_required && !self.processing.extraction_enabled {
            return Err(anyhow::anyhow!(
                "EXTRACTION_REQUIRED=true requires EXTRACTION_ENABLED=true"
            ));
        }

        self.storage.validate()?;

        let needs_database = self.repository.backend == RepositoryBackend::Postgres
            || self.event_bus.backend == EventBusBackend::Postgres;
        if needs_database {
            match self.repository.database_url.as_deref() {
                Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {}
                Some(_) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when using the postgres repository or event bus"
                    ))
                }
            }
        }

        if self.event_bus.channel.is_empty() {
            return Err(anyhow::anyhow!("EVENT_CHANNEL must not be empty"));
        }

        if self.worker.max_concurrency == 0 {
            return Err(anyhow::anyhow!(
                "WORKER_MAX_CONCURRENCY must be greater than 0"
            ));
        }

        Ok(())
    }

    /// In-process configuration: memory repository and bus, the given storage.
    pub fn in_memory(storage: StorageConfig) -> Self {
        Self {
            base: BaseConfig {
                server_port: DEFAULT_PORT,
                cors_origins: vec!["*".to_string()],
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                environment: "development".to_string(),
            },
            upload: UploadPolicy::default(),
            processing: ProcessingFlags::default(),
            storage,
            repository: RepositoryConfig {
                backend: RepositoryBackend::Memory,
                database_url: None,
            },
            event_bus: EventBusConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_normalizes() {
        assert_eq!(parse_list(" PDF, .png ,,jpg"), vec!["pdf", "png", "jpg"]);
    }

    #[test]
    fn test_default_upload_policy() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.max_file_size_mb(), 50);
        assert_eq!(policy.max_batch_files, 100);
        assert!(policy.allowed_extensions.contains(&"jpeg".to_string()));
        assert!(policy
            .allowed_content_types
            .contains(&"application/pdf".to_string()));
        assert_eq!(policy.default_uploaded_by, "anonymous");
    }

    #[test]
    fn test_in_memory_config_is_valid() {
        let config = DocketConfig::in_memory(StorageConfig::memory());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_rejects_wildcard_cors() {
        let mut config = DocketConfig::in_memory(StorageConfig::memory());
        config.base.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.base.cors_origins = vec!["https://docs.example.com".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut config = DocketConfig::in_memory(StorageConfig::memory());
        config.repository.backend = RepositoryBackend::Postgres;
        assert!(config.validate().is_err());

        config.repository.database_url = Some("mysql://localhost/docs".to_string());
        assert!(config.validate().is_err());

        config.repository.database_url = Some("postgres://localhost/docs".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_required_stage_must_be_enabled() {
        let mut config = DocketConfig::in_memory(StorageConfig::memory());
        config.processing = ProcessingFlags {
            ocr_enabled: false,
            extraction_enabled: true,
            ocr_required: true,
            extraction_required: true,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_validation() {
        let mut storage = StorageConfig::memory();
        storage.backend = StorageBackend::Gcs;
        assert!(storage.validate().is_err());
        storage.bucket = Some("plc-documents".to_string());
        assert!(storage.validate().is_ok());

        storage.backend = StorageBackend::S3;
        assert!(storage.validate().is_err());
        storage.region = Some("eu-west-1".to_string());
        assert!(storage.validate().is_ok());

        assert!(StorageConfig::local("/tmp/docket").validate().is_ok());
    }

    #[test]
    fn test_request_body_limit_covers_full_batch() {
        let config = Config(Box::new(DocketConfig::in_memory(StorageConfig::memory())));
        assert!(config.max_request_body_bytes() > 50 * 1024 * 1024 * 100);
    }
}
