//! Configuration module
//!
//! All settings are read once at startup into an immutable [`Config`] that is
//! shared (behind an `Arc`) by every component. Nothing reads the environment
//! after that point.
//!
//! [`Config::from_env`] loads `.env` and reads the process environment;
//! [`Config::from_lookup`] takes any key lookup so tests can build a
//! configuration without touching process state. The `dispatch_*`
//! constructors skip the bucket requirements for tools that only enqueue.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_CLOUD_TASKS_ENDPOINT, DEFAULT_PORT, DEFAULT_QUEUE_LOCATION, DEFAULT_QUEUE_NAME,
};
use crate::storage_types::StorageBackend;

const MAX_UPLOAD_SIZE_MB: usize = 32;
const LOCAL_QUEUE_WORKERS: usize = 4;
const LOCAL_QUEUE_MAX_ATTEMPTS: u32 = 5;
const LOCAL_QUEUE_BACKOFF_MS: u64 = 1000;
const LOCAL_QUEUE_MAX_BACKOFF_MS: u64 = 300_000;
const DEFAULT_LOCAL_SOURCE_BUCKET: &str = "source";
const DEFAULT_LOCAL_DEST_BUCKET: &str = "destination";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// What the loaded configuration will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadScope {
    /// Serving requests: buckets must be reachable
    Service,
    /// Enqueueing only: no bucket is ever opened
    DispatchOnly,
}

/// Console log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Which queue carries conversion tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskQueueBackend {
    #[default]
    CloudTasks,
    /// In-process queue delivering over HTTP, for development and tests
    Local,
}

impl FromStr for TaskQueueBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloud-tasks" | "cloudtasks" | "cloud_tasks" => Ok(TaskQueueBackend::CloudTasks),
            "local" => Ok(TaskQueueBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid task queue backend: {}", s)),
        }
    }
}

impl Display for TaskQueueBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskQueueBackend::CloudTasks => write!(f, "cloud-tasks"),
            TaskQueueBackend::Local => write!(f, "local"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub source_bucket: String,
    pub destination_bucket: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
}

/// Settings the fan-out dispatcher needs to address tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub project: String,
    pub location: String,
    pub queue: String,
    /// Base URL of the conversion service, without trailing slash
    pub run_url: String,
    /// Identity the queue signs OIDC tokens as; audience is `run_url`
    pub service_account: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CloudTasksConfig {
    pub endpoint: String,
    pub access_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LocalQueueConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for LocalQueueConfig {
    fn default() -> Self {
        Self {
            workers: LOCAL_QUEUE_WORKERS,
            max_attempts: LOCAL_QUEUE_MAX_ATTEMPTS,
            backoff_ms: LOCAL_QUEUE_BACKOFF_MS,
            max_backoff_ms: LOCAL_QUEUE_MAX_BACKOFF_MS,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub log_format: LogFormat,
    pub storage: StorageConfig,
    /// Public base URL fronting the destination bucket, without trailing slash
    pub cdn_url: Option<String>,
    /// Cache-Control metadata written on destination objects
    pub dest_cache_control: Option<String>,
    pub max_upload_size_bytes: usize,
    /// Encoder quality preset name (normal, better, best, lighter)
    pub output_quality: String,
    pub task_queue_backend: TaskQueueBackend,
    /// `None` when the service only converts and never fans out
    pub dispatch: Option<DispatchConfig>,
    pub cloud_tasks: CloudTasksConfig,
    pub local_queue: LocalQueueConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(lookup, LoadScope::Service)
    }

    /// Like [`Config::from_env`] but bucket names and storage backend
    /// settings are optional.
    pub fn dispatch_from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::dispatch_from_lookup(|key| env::var(key).ok())
    }

    pub fn dispatch_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(lookup, LoadScope::DispatchOnly)
    }

    fn load<F>(lookup: F, scope: LoadScope) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment = get("ENVIRONMENT")
            .or_else(|| get("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let server_port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;

        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|e: anyhow::Error| invalid("LOG_FORMAT", &v, e))?,
            None => LogFormat::default(),
        };

        let backend = match get("STORAGE_BACKEND") {
            Some(v) => v
                .parse()
                .map_err(|e: anyhow::Error| invalid("STORAGE_BACKEND", &v, e))?,
            None => StorageBackend::Gcs,
        };

        let buckets_required = scope == LoadScope::Service;
        let storage = StorageConfig {
            backend,
            source_bucket: bucket_name(
                backend,
                buckets_required,
                "SRC_BUCKET_NAME",
                get("SRC_BUCKET_NAME"),
                DEFAULT_LOCAL_SOURCE_BUCKET,
            )?,
            destination_bucket: bucket_name(
                backend,
                buckets_required,
                "DEST_BUCKET_NAME",
                get("DEST_BUCKET_NAME"),
                DEFAULT_LOCAL_DEST_BUCKET,
            )?,
            s3_region: get("S3_REGION").or_else(|| get("AWS_REGION")),
            s3_endpoint: get("S3_ENDPOINT"),
            local_storage_path: get("LOCAL_STORAGE_PATH"),
        };

        let task_queue_backend = match get("TASK_QUEUE_BACKEND") {
            Some(v) => v
                .parse()
                .map_err(|e: anyhow::Error| invalid("TASK_QUEUE_BACKEND", &v, e))?,
            None => TaskQueueBackend::default(),
        };

        let dispatch = dispatch_config(&get, task_queue_backend)?;

        let max_upload_mb = parse_or(
            "MAX_UPLOAD_SIZE_MB",
            get("MAX_UPLOAD_SIZE_MB"),
            MAX_UPLOAD_SIZE_MB,
        )?;

        let local_queue = LocalQueueConfig {
            workers: parse_or(
                "LOCAL_QUEUE_WORKERS",
                get("LOCAL_QUEUE_WORKERS"),
                LOCAL_QUEUE_WORKERS,
            )?,
            max_attempts: parse_or(
                "LOCAL_QUEUE_MAX_ATTEMPTS",
                get("LOCAL_QUEUE_MAX_ATTEMPTS"),
                LOCAL_QUEUE_MAX_ATTEMPTS,
            )?,
            backoff_ms: parse_or(
                "LOCAL_QUEUE_BACKOFF_MS",
                get("LOCAL_QUEUE_BACKOFF_MS"),
                LOCAL_QUEUE_BACKOFF_MS,
            )?,
            max_backoff_ms: parse_or(
                "LOCAL_QUEUE_MAX_BACKOFF_MS",
                get("LOCAL_QUEUE_MAX_BACKOFF_MS"),
                LOCAL_QUEUE_MAX_BACKOFF_MS,
            )?,
        };

        let config = Config {
            server_port,
            environment,
            log_format,
            storage,
            cdn_url: get("CDN_URL").map(|u| u.trim_end_matches('/').to_string()),
            dest_cache_control: get("DEST_CACHE_CONTROL"),
            max_upload_size_bytes: max_upload_mb * 1024 * 1024,
            output_quality: get("OUTPUT_QUALITY").unwrap_or_else(|| "normal".to_string()),
            task_queue_backend,
            dispatch,
            cloud_tasks: CloudTasksConfig {
                endpoint: get("CLOUD_TASKS_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_CLOUD_TASKS_ENDPOINT.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                access_token: get("CLOUD_TASKS_ACCESS_TOKEN"),
            },
            local_queue,
        };

        match scope {
            LoadScope::Service => config.validate()?,
            LoadScope::DispatchOnly => config.validate_settings()?,
        }
        Ok(config)
    }

    /// Check cross-field rules. Called by the constructors; exposed so
    /// hand-built configs (tests, embedding) can be checked the same way.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Local && self.storage.local_storage_path.is_none()
        {
            return Err(ConfigError::Missing("LOCAL_STORAGE_PATH".to_string()));
        }

        if self.storage.backend == StorageBackend::S3 && self.storage.s3_region.is_none() {
            return Err(ConfigError::Missing("S3_REGION or AWS_REGION".to_string()));
        }

        self.validate_settings()
    }

    fn validate_settings(&self) -> Result<(), ConfigError> {
        if let Some(cdn) = &self.cdn_url {
            require_http_url("CDN_URL", cdn)?;
        }

        if let Some(dispatch) = &self.dispatch {
            require_http_url("RUN_URL", &dispatch.run_url)?;
        }

        if self.max_upload_size_bytes == 0 {
            return Err(invalid("MAX_UPLOAD_SIZE_MB", "0", "must be greater than zero"));
        }

        if self.local_queue.workers == 0 {
            return Err(invalid("LOCAL_QUEUE_WORKERS", "0", "must be greater than zero"));
        }

        if self.local_queue.max_attempts == 0 {
            return Err(invalid(
                "LOCAL_QUEUE_MAX_ATTEMPTS",
                "0",
                "must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        matches!(
            self.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    /// Public URL of an output object when a CDN fronts the destination bucket.
    pub fn cdn_object_url(&self, name: &str) -> Option<String> {
        self.cdn_url.as_ref().map(|cdn| format!("{}/{}", cdn, name))
    }
}

fn dispatch_config<G>(
    get: &G,
    backend: TaskQueueBackend,
) -> Result<Option<DispatchConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let run_url = get("RUN_URL");
    let service_account = get("SERVICE_ACCOUNT");

    let Some(run_url) = run_url else {
        if service_account.is_some() {
            return Err(ConfigError::Missing(
                "RUN_URL (required when SERVICE_ACCOUNT is set)".to_string(),
            ));
        }
        return Ok(None);
    };

    let project = get("GCLOUD_PROJECT")
        .or_else(|| get("PROJECT_ID"))
        .or_else(|| get("GOOGLE_CLOUD_PROJECT"));

    let (project, service_account) = match backend {
        TaskQueueBackend::CloudTasks => {
            let project = project
                .ok_or_else(|| ConfigError::Missing("GCLOUD_PROJECT or PROJECT_ID".to_string()))?;
            let service_account = service_account
                .ok_or_else(|| ConfigError::Missing("SERVICE_ACCOUNT".to_string()))?;
            (project, Some(service_account))
        }
        TaskQueueBackend::Local => (
            project.unwrap_or_else(|| "local".to_string()),
            service_account,
        ),
    };

    Ok(Some(DispatchConfig {
        project,
        location: get("TASK_QUEUE_LOCATION").unwrap_or_else(|| DEFAULT_QUEUE_LOCATION.to_string()),
        queue: get("TASK_QUEUE_NAME").unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
        run_url: run_url.trim_end_matches('/').to_string(),
        service_account,
    }))
}

fn bucket_name(
    backend: StorageBackend,
    required: bool,
    key: &str,
    value: Option<String>,
    local_default: &str,
) -> Result<String, ConfigError> {
    match (value, backend) {
        (Some(v), _) => Ok(v),
        (None, StorageBackend::Local | StorageBackend::Memory) => Ok(local_default.to_string()),
        (None, _) if !required => Ok(local_default.to_string()),
        (None, _) => Err(ConfigError::Missing(key.to_string())),
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        Some(v) => v.parse::<T>().map_err(|e| invalid(key, &v, e)),
        None => Ok(default),
    }
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(invalid(key, value, "must start with http:// or https://"))
    }
}

fn invalid(key: &str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
