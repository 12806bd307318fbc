use crate::cli::Args;
use chrono::{NaiveDate, Utc};
use nba_pipeline::config::Config;
use nba_pipeline::data_fetcher::StatsApi;
use nba_pipeline::error::AppError;
use nba_pipeline::pipeline::Pipeline;
use nba_pipeline::scheduler::{DailyTrigger, run_daily};
use nba_pipeline::warehouse::SqliteWarehouse;
use tracing::info;

/// Parses `--date`, defaulting to today's UTC date.
pub fn run_date(args: &Args) -> Result<NaiveDate, AppError> {
    match args.date.as_deref() {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
            AppError::datetime_parse_error(format!("Invalid --date '{value}', expected YYYY-MM-DD: {e}"))
        }),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Applies command line overrides on top of file and environment values and
/// re-validates the result.
pub fn apply_cli_overrides(config: &mut Config, args: &Args) -> Result<(), AppError> {
    if let Some(team_id) = &args.team_id {
        config.team_id = team_id.trim().to_string();
    }
    if let Some(season) = &args.season {
        config.season = season.trim().to_string();
    }
    if let Some(scope) = args.scope {
        config.scope = scope;
    }
    if args.off_season {
        config.off_season = true;
    }
    config.validate()
}

/// Handles the --list-config command.
pub fn handle_list_config_command(config: &Config, args: &Args) {
    let path = args.config.clone().unwrap_or_else(Config::get_config_path);
    config.display(&path);
}

fn build_pipeline(config: &Config) -> Result<Pipeline<SqliteWarehouse>, AppError> {
    let api = StatsApi::new(config)?;
    let warehouse = SqliteWarehouse::from_settings(&config.warehouse)?;
    Ok(Pipeline::new(config.clone(), api, warehouse))
}

/// Runs the pipeline once for the requested date and prints a summary.
pub async fn handle_run_command(args: &Args, config: &Config) -> Result<(), AppError> {
    let date = run_date(args)?;
    let pipeline = build_pipeline(config)?;

    let summary = pipeline.run(date, args.from_step).await?;

    println!(
        "Run {} complete in {:.1}s (team {}, season {}, scope {})",
        summary.run_date,
        summary.elapsed.as_secs_f64(),
        summary.manifest.team_id,
        summary.manifest.season,
        summary.manifest.scope.as_str()
    );
    for report in &summary.loads {
        println!(
            "  {:<14} {:>5} rows loaded ({} replaced)",
            report.table.to_string(),
            report.rows_loaded,
            report.rows_replaced
        );
    }
    Ok(())
}

/// Runs the daily trigger loop until interrupted.
pub async fn handle_daemon_command(config: &Config) -> Result<(), AppError> {
    let trigger = DailyTrigger::parse(&config.pipeline.trigger_time)?;
    let pipeline = build_pipeline(config)?;
    run_daily(&pipeline, trigger).await?;
    info!("Daemon stopped");
    Ok(())
}
