use std::fmt;
use thiserror::Error;

/// Coarse classification of failures, used by the orchestrator to decide
/// whether a step may be retried and reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Upstream timeouts, connection drops, rate limits and 5xx responses.
    TransientNetwork,
    /// Extracted files are missing, empty or inconsistent with the manifest.
    ExtractionIncomplete,
    /// Transfer into the warehouse staging area failed.
    StagingTransport,
    /// A staged file could not be loaded (bad header, malformed row).
    LoadSchema,
    /// Invalid configuration or command line arguments.
    Config,
    /// Anything else: local I/O, unexpected API payloads, lock contention.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransientNetwork => "TransientNetworkError",
            ErrorKind::ExtractionIncomplete => "ExtractionIncomplete",
            ErrorKind::StagingTransport => "StagingTransportError",
            ErrorKind::LoadSchema => "LoadSchemaError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to fetch data from API: {0}")]
    ApiFetch(#[from] reqwest::Error),

    #[error("Failed to parse API response: {0}")]
    ApiParse(#[from] serde_json::Error),

    // Specific HTTP status code errors
    #[error("API request not found (404): {url}")]
    ApiNotFound { url: String },

    #[error("API server error ({status}): {message} (URL: {url})")]
    ApiServerError {
        status: u16,
        message: String,
        url: String,
    },

    #[error("API client error ({status}): {message} (URL: {url})")]
    ApiClientError {
        status: u16,
        message: String,
        url: String,
    },

    #[error("API rate limit exceeded (429): {message} (URL: {url})")]
    ApiRateLimit {
        message: String,
        url: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("API service unavailable ({status}): {message} (URL: {url})")]
    ApiServiceUnavailable {
        status: u16,
        message: String,
        url: String,
    },

    // Network-specific errors
    #[error("Network timeout while fetching data from: {url}")]
    NetworkTimeout { url: String },

    #[error("Connection failed to: {url} - {message}")]
    NetworkConnection { url: String, message: String },

    #[error("Gave up on {operation} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        kind: ErrorKind,
        last_error: String,
    },

    // Data parsing and validation errors
    #[error("API returned malformed JSON: {message} (URL: {url})")]
    ApiMalformedJson { message: String, url: String },

    #[error("API returned unexpected data structure: {message} (URL: {url})")]
    ApiUnexpectedStructure { message: String, url: String },

    #[error("Extraction incomplete for {path}: {message}")]
    ExtractionIncomplete { path: String, message: String },

    #[error("Staging transfer failed for {file}: {message}")]
    StagingTransport { file: String, message: String },

    #[error("Load into {table} failed at line {line}: {message}")]
    LoadSchema {
        table: String,
        line: u64,
        message: String,
    },

    #[error("A run for {run_date} is already active (lock: {lock_path})")]
    RunAlreadyActive { run_date: String, lock_path: String },

    #[error("Step '{step}' failed [{kind}]: {source}")]
    StepFailed {
        step: String,
        kind: ErrorKind,
        #[source]
        source: Box<AppError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] rusqlite::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Date/time parsing error: {0}")]
    DateTimeParse(String),

    #[error("Log setup error: {0}")]
    LogSetup(String),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl AppError {
    /// Create a configuration error with context
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a date/time parsing error with context
    pub fn datetime_parse_error(msg: impl Into<String>) -> Self {
        Self::DateTimeParse(msg.into())
    }

    /// Create a log setup error with context
    pub fn log_setup_error(msg: impl Into<String>) -> Self {
        Self::LogSetup(msg.into())
    }

    /// Create an API not found error
    pub fn api_not_found(url: impl Into<String>) -> Self {
        Self::ApiNotFound { url: url.into() }
    }

    /// Create an API server error (5xx status codes)
    pub fn api_server_error(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiServerError {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an API client error (4xx status codes except 404 and 429)
    pub fn api_client_error(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiClientError {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an API rate limit error
    pub fn api_rate_limit(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiRateLimit {
            message: message.into(),
            url: url.into(),
            retry_after_seconds: None,
        }
    }

    /// Attach the server's `Retry-After` hint to a rate limit error
    pub fn with_retry_after(self, seconds: Option<u64>) -> Self {
        match self {
            Self::ApiRateLimit { message, url, .. } => Self::ApiRateLimit {
                message,
                url,
                retry_after_seconds: seconds,
            },
            other => other,
        }
    }

    /// Server-requested wait before the next attempt, if any
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::ApiRateLimit {
                retry_after_seconds: Some(seconds),
                ..
            } => Some(std::time::Duration::from_secs(*seconds)),
            _ => None,
        }
    }

    /// Create an API service unavailable error
    pub fn api_service_unavailable(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiServiceUnavailable {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create a network timeout error
    pub fn network_timeout(url: impl Into<String>) -> Self {
        Self::NetworkTimeout { url: url.into() }
    }

    /// Create a network connection error
    pub fn network_connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NetworkConnection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Wrap the last transient failure once a retry budget is spent
    pub fn retries_exhausted(operation: impl Into<String>, attempts: u32, last: &AppError) -> Self {
        Self::RetriesExhausted {
            operation: operation.into(),
            attempts,
            kind: last.kind(),
            last_error: last.to_string(),
        }
    }

    /// Create a malformed JSON error
    pub fn api_malformed_json(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiMalformedJson {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an unexpected data structure error
    pub fn api_unexpected_structure(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiUnexpectedStructure {
            message: message.into(),
            url: url.into(),
        }
    }

    pub fn extraction_incomplete(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionIncomplete {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn staging_transport(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StagingTransport {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn load_schema(table: impl Into<String>, line: u64, message: impl Into<String>) -> Self {
        Self::LoadSchema {
            table: table.into(),
            line,
            message: message.into(),
        }
    }

    /// Wrap a step failure with the step name and the kind of the root cause
    pub fn step_failed(step: impl Into<String>, source: AppError) -> Self {
        Self::StepFailed {
            step: step.into(),
            kind: source.kind(),
            source: Box::new(source),
        }
    }

    /// Check if error is retryable (network issues, server errors, rate limits,
    /// staging transfers)
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::StepFailed { source, .. } => source.is_retryable(),
            AppError::ApiFetch(e) => e.is_timeout() || e.is_connect(),
            _ => matches!(
                self,
                AppError::NetworkTimeout { .. }
                    | AppError::NetworkConnection { .. }
                    | AppError::ApiServerError { .. }
                    | AppError::ApiServiceUnavailable { .. }
                    | AppError::ApiRateLimit { .. }
                    | AppError::RetriesExhausted { .. }
                    | AppError::StagingTransport { .. }
            ),
        }
    }

    /// Map every error onto the pipeline taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NetworkTimeout { .. }
            | AppError::NetworkConnection { .. }
            | AppError::ApiServerError { .. }
            | AppError::ApiServiceUnavailable { .. }
            | AppError::ApiRateLimit { .. } => ErrorKind::TransientNetwork,
            AppError::ApiFetch(e) if e.is_timeout() || e.is_connect() => {
                ErrorKind::TransientNetwork
            }
            AppError::RetriesExhausted { kind, .. } => *kind,
            AppError::ExtractionIncomplete { .. } => ErrorKind::ExtractionIncomplete,
            AppError::StagingTransport { .. } => ErrorKind::StagingTransport,
            AppError::LoadSchema { .. } | AppError::Csv(_) => ErrorKind::LoadSchema,
            AppError::Config(_)
            | AppError::TomlDeserialize(_)
            | AppError::TomlSerialize(_)
            | AppError::DateTimeParse(_) => ErrorKind::Config,
            AppError::StepFailed { kind, .. } => *kind,
            _ => ErrorKind::Internal,
        }
    }
}
