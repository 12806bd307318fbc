//! Application-wide constants and configuration defaults
//!
//! This module centralizes magic numbers, default values and well-known
//! names so configuration, extraction and loading agree on them.

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Maximum number of connections per host in the HTTP client pool
pub const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Base URL of the public stats API
pub const DEFAULT_API_BASE_URL: &str = "https://stats.nba.com/stats";

/// Minnesota Timberwolves
pub const DEFAULT_TEAM_ID: &str = "1610612750";

pub const DEFAULT_SEASON: &str = "2024-25";

/// Root directory of the run-date partitions
pub const DEFAULT_DATA_DIR: &str = "data/raw";

/// Pause between consecutive box score calls (the API throttles aggressively)
pub const DEFAULT_REQUEST_INTERVAL_MS: u64 = 600;

/// Regular season length, the upper bound of a season's game log
pub const REGULAR_SEASON_GAMES: usize = 82;

/// Output files of a run-date partition
pub mod files {
    pub const GAMES: &str = "games.csv";
    pub const PLAYER_STATS: &str = "player_stats.csv";
    pub const MANIFEST: &str = "manifest.json";
    pub const RUN_LOCK: &str = ".run.lock";

    /// Format of the partition directory name
    pub const PARTITION_DATE_FORMAT: &str = "%Y%m%d";
}

/// Warehouse defaults
pub mod warehouse {
    pub const DEFAULT_DATABASE_FILE: &str = "warehouse.db";
    pub const DEFAULT_STAGE_DIR: &str = "stage";

    pub const GAMES_TABLE: &str = "games";
    pub const PLAYER_STATS_TABLE: &str = "player_stats";
}

/// Environment variable names
pub mod env_vars {
    pub const TEAM_ID: &str = "NBA_TEAM_ID";
    pub const SEASON: &str = "NBA_SEASON";
    pub const API_BASE_URL: &str = "NBA_API_BASE_URL";
    pub const DATA_DIR: &str = "NBA_DATA_DIR";
    pub const LOG_FILE: &str = "NBA_LOG_FILE";
    pub const HTTP_TIMEOUT: &str = "NBA_HTTP_TIMEOUT";
}

/// Retry configuration for upstream API calls
pub mod retry {
    /// Maximum number of attempts per API call (first try included)
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Base delay for backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1000;

    /// Maximum delay between retries (milliseconds)
    pub const MAX_DELAY_MS: u64 = 30_000;
}

/// Step-level orchestration defaults
pub mod pipeline {
    /// Retries granted to a failing step before the run is marked failed
    pub const STEP_RETRIES: u32 = 1;

    /// Fixed delay before a step is retried (seconds)
    pub const STEP_RETRY_DELAY_SECONDS: u64 = 300;

    /// Age after which a run lock left by a crashed run is taken over (seconds)
    pub const LOCK_STALE_AFTER_SECONDS: u64 = 6 * 60 * 60;

    /// Daily trigger, UTC (6 AM Eastern)
    pub const TRIGGER_TIME: &str = "11:00";
}

/// Headers the stats API expects from a browser; requests without them hang
pub mod headers {
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
    pub const REFERER: &str = "https://www.nba.com/";
    pub const ORIGIN: &str = "https://www.nba.com";
    pub const ACCEPT: &str = "application/json, text/plain, */*";
}
