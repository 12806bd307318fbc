use crate::constants;
use crate::constants::env_vars;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub mod paths;
pub mod validation;

use paths::{get_config_path, get_log_dir_path};
use validation::validate_config;

/// Which games of the season a run extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractScope {
    /// Every game played up to and including the run date.
    #[default]
    Season,
    /// Only games played on the run date.
    Day,
}

impl ExtractScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractScope::Season => "season",
            ExtractScope::Day => "day",
        }
    }
}

/// Retry budget for a single upstream call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Double the delay after every failed attempt instead of keeping it fixed
    pub exponential: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: constants::retry::MAX_ATTEMPTS,
            base_delay_ms: constants::retry::BASE_DELAY_MS,
            max_delay_ms: constants::retry::MAX_DELAY_MS,
            exponential: true,
        }
    }
}

/// Step ordering policy and the daily trigger.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub step_retries: u32,
    pub step_retry_delay_seconds: u64,
    /// UTC wall-clock time of the daily run, `HH:MM`
    pub trigger_time: String,
    /// A run lock older than this, or whose process is gone, is replaced
    pub lock_stale_after_seconds: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            step_retries: constants::pipeline::STEP_RETRIES,
            step_retry_delay_seconds: constants::pipeline::STEP_RETRY_DELAY_SECONDS,
            trigger_time: constants::pipeline::TRIGGER_TIME.to_string(),
            lock_stale_after_seconds: constants::pipeline::LOCK_STALE_AFTER_SECONDS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WarehouseSettings {
    pub database_path: String,
    pub stage_dir: String,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        WarehouseSettings {
            database_path: format!("data/{}", constants::warehouse::DEFAULT_DATABASE_FILE),
            stage_dir: format!("data/{}", constants::warehouse::DEFAULT_STAGE_DIR),
        }
    }
}

/// Configuration structure for the pipeline.
/// Passed explicitly into every step; nothing reads process-wide state after load.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Base URL of the stats API, without a trailing slash.
    pub api_base_url: String,
    /// NBA team identifier, e.g. `1610612750`.
    pub team_id: String,
    /// Season string in `YYYY-YY` form, e.g. `2024-25`.
    pub season: String,
    /// Root of the run-date partitions.
    pub data_dir: String,
    pub scope: ExtractScope,
    /// Accept an empty game log (no games played yet or season over).
    pub off_season: bool,
    /// HTTP timeout in seconds for API requests. Defaults to 30 seconds if not specified.
    pub http_timeout_seconds: u64,
    /// Pause between box score requests in milliseconds.
    pub request_interval_ms: u64,
    /// Path to the log file. If not specified, logs will be written to a default location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
    pub retry: RetrySettings,
    pub pipeline: PipelineSettings,
    pub warehouse: WarehouseSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            team_id: constants::DEFAULT_TEAM_ID.to_string(),
            season: constants::DEFAULT_SEASON.to_string(),
            data_dir: constants::DEFAULT_DATA_DIR.to_string(),
            scope: ExtractScope::default(),
            off_season: false,
            http_timeout_seconds: constants::DEFAULT_HTTP_TIMEOUT_SECONDS,
            request_interval_ms: constants::DEFAULT_REQUEST_INTERVAL_MS,
            log_file_path: None,
            retry: RetrySettings::default(),
            pipeline: PipelineSettings::default(),
            warehouse: WarehouseSettings::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the default config file location.
    /// A missing file yields the defaults. Environment variables override file values.
    ///
    /// # Environment Variables
    /// - `NBA_TEAM_ID` - Override team id
    /// - `NBA_SEASON` - Override season
    /// - `NBA_API_BASE_URL` - Override API base URL
    /// - `NBA_DATA_DIR` - Override data directory
    /// - `NBA_LOG_FILE` - Override log file path
    /// - `NBA_HTTP_TIMEOUT` - Override HTTP timeout in seconds (default: 30)
    ///
    /// # Returns
    /// * `Ok(Config)` - Validated configuration
    /// * `Err(AppError)` - Unreadable file, invalid TOML or failed validation
    pub async fn load(path: Option<&str>) -> Result<Self, AppError> {
        let config_path = path.map(str::to_string).unwrap_or_else(get_config_path);

        let mut config = if Path::new(&config_path).exists() {
            Self::load_from_path(&config_path).await?
        } else {
            if path.is_some() {
                return Err(AppError::config_error(format!(
                    "Config file not found: {config_path}"
                )));
            }
            tracing::debug!("No config file at {config_path}, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Override values from environment variables if present
    pub fn apply_env_overrides(&mut self) {
        if let Ok(team_id) = std::env::var(env_vars::TEAM_ID) {
            self.team_id = team_id;
        }

        if let Ok(season) = std::env::var(env_vars::SEASON) {
            self.season = season;
        }

        if let Ok(api_base_url) = std::env::var(env_vars::API_BASE_URL) {
            self.api_base_url = api_base_url;
        }

        if let Ok(data_dir) = std::env::var(env_vars::DATA_DIR) {
            self.data_dir = data_dir;
        }

        if let Ok(log_file_path) = std::env::var(env_vars::LOG_FILE) {
            self.log_file_path = Some(log_file_path);
        }

        if let Some(timeout) = std::env::var(env_vars::HTTP_TIMEOUT)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.http_timeout_seconds = timeout;
        }
    }

    /// Validates the configuration settings
    pub fn validate(&self) -> Result<(), AppError> {
        validate_config(self)
    }

    /// Returns the platform-specific path for the config file.
    pub fn get_config_path() -> String {
        paths::get_config_path()
    }

    /// Returns the platform-specific path for the log directory.
    pub fn get_log_dir_path() -> String {
        paths::get_log_dir_path()
    }

    /// Prints the effective configuration to stdout.
    pub fn display(&self, config_path: &str) {
        let log_dir = get_log_dir_path();

        println!("\nCurrent Configuration");
        println!("────────────────────────────────────");
        println!("Config Location:");
        if Path::new(config_path).exists() {
            println!("{config_path}");
        } else {
            println!("{config_path} (not found, defaults in use)");
        }
        println!("────────────────────────────────────");
        println!("Team / Season:");
        println!("{} / {}", self.team_id, self.season);
        println!("Scope: {}", self.scope.as_str());
        println!("Off-season: {}", self.off_season);
        println!("────────────────────────────────────");
        println!("API Base URL:");
        println!("{}", self.api_base_url);
        println!(
            "HTTP timeout: {} seconds, request interval: {} ms",
            self.http_timeout_seconds, self.request_interval_ms
        );
        println!(
            "Retry: {} attempts, {} ms base delay ({})",
            self.retry.max_attempts,
            self.retry.base_delay_ms,
            if self.retry.exponential {
                "exponential"
            } else {
                "fixed"
            }
        );
        println!("────────────────────────────────────");
        println!("Data Directory:");
        println!("{}", self.data_dir);
        println!("Warehouse:");
        println!("{}", self.warehouse.database_path);
        println!("Stage:");
        println!("{}", self.warehouse.stage_dir);
        println!("────────────────────────────────────");
        println!(
            "Daily trigger: {} UTC, step retries: {} after {} s",
            self.pipeline.trigger_time,
            self.pipeline.step_retries,
            self.pipeline.step_retry_delay_seconds
        );
        println!(
            "Stale run lock after: {} s",
            self.pipeline.lock_stale_after_seconds
        );
        println!("Log File Location:");
        if let Some(custom_path) = &self.log_file_path {
            println!("{custom_path}");
        } else {
            println!("{log_dir}/nba_pipeline.log");
            println!("(Default location)");
        }
    }

    /// Saves configuration to a file path, creating the parent directory if needed.
    ///
    /// # Errors
    /// * `AppError::Config` - If the provided path has no parent directory
    /// * `AppError::Io` - If there's an I/O error creating directories or writing the file
    /// * `AppError::TomlSerialize` - If there's an error serializing the configuration
    pub async fn save_to_path(&self, path: &str) -> Result<(), AppError> {
        let config_dir = Path::new(path).parent().ok_or_else(|| {
            AppError::config_error(format!("Path '{path}' has no parent directory"))
        })?;

        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir).await?;
        }
        let content = toml::to_string_pretty(self)?;
        let mut file = fs::File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Loads configuration from a file path without env overrides or validation.
    pub async fn load_from_path(path: &str) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
