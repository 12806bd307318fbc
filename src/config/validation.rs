use crate::config::Config;
use crate::error::AppError;
use chrono::NaiveTime;
use std::path::Path;

/// Validates the configuration settings
///
/// # Validation Rules
/// - Team id is a 10-digit NBA team identifier
/// - Season is `YYYY-YY` with consecutive years
/// - API base URL is an http(s) URL
/// - At least one attempt per API call
/// - Trigger time parses as `HH:MM`
/// - Stale lock bound is non-zero
/// - Data, stage and database paths are not empty
/// - Log file path parent directory must exist or be creatable
pub fn validate_config(config: &Config) -> Result<(), AppError> {
    validate_team_id(&config.team_id)?;
    validate_season(&config.season)?;

    if !config.api_base_url.starts_with("http://") && !config.api_base_url.starts_with("https://")
    {
        return Err(AppError::config_error(format!(
            "API base URL must start with http:// or https://, got '{}'",
            config.api_base_url
        )));
    }

    if config.retry.max_attempts == 0 {
        return Err(AppError::config_error("retry.max_attempts must be at least 1"));
    }

    parse_trigger_time(&config.pipeline.trigger_time)?;

    if config.pipeline.lock_stale_after_seconds == 0 {
        return Err(AppError::config_error(
            "pipeline.lock_stale_after_seconds must be at least 1",
        ));
    }

    for (name, value) in [
        ("data_dir", &config.data_dir),
        ("warehouse.database_path", &config.warehouse.database_path),
        ("warehouse.stage_dir", &config.warehouse.stage_dir),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::config_error(format!("{name} cannot be empty")));
        }
    }

    if let Some(log_path) = &config.log_file_path {
        if log_path.is_empty() {
            return Err(AppError::config_error("Log file path cannot be empty"));
        }

        if let Some(parent) = Path::new(log_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::config_error(format!(
                    "Cannot create log directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

/// NBA team ids are ten-digit numbers, e.g. `1610612750`.
pub fn validate_team_id(team_id: &str) -> Result<(), AppError> {
    if team_id.len() != 10 || !team_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::config_error(format!(
            "Team id must be a 10-digit NBA team identifier, got '{team_id}'"
        )));
    }
    Ok(())
}

/// Seasons are written `2024-25`: a start year and the last two digits of the next year.
pub fn validate_season(season: &str) -> Result<(), AppError> {
    let invalid = || {
        AppError::config_error(format!(
            "Season must be in YYYY-YY format with consecutive years, got '{season}'"
        ))
    };

    let (start, end) = season.split_once('-').ok_or_else(invalid)?;
    if start.len() != 4 || end.len() != 2 {
        return Err(invalid());
    }
    let start_year: u32 = start.parse().map_err(|_| invalid())?;
    let end_suffix: u32 = end.parse().map_err(|_| invalid())?;

    if (start_year + 1) % 100 != end_suffix {
        return Err(invalid());
    }
    Ok(())
}

pub fn parse_trigger_time(value: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
        AppError::config_error(format!("Trigger time must be HH:MM, got '{value}': {e}"))
    })
}
