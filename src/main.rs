// src/main.rs
mod cli;
mod commands;
mod logging;

use clap::Parser;
use cli::Args;
use commands::{
    apply_cli_overrides, handle_daemon_command, handle_list_config_command, handle_run_command,
};
use nba_pipeline::config::Config;
use nba_pipeline::error::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // Load config first to fail early if there's an issue
    let mut config = Config::load(args.config.as_deref()).await?;
    apply_cli_overrides(&mut config, &args)?;

    if args.list_config {
        handle_list_config_command(&config, &args);
        return Ok(());
    }

    let (log_file_path, _guard) = logging::setup_logging(&args, &config).await?;
    tracing::info!("Logs are being written to: {log_file_path}");

    let result = if args.daemon {
        handle_daemon_command(&config).await
    } else {
        handle_run_command(&args, &config).await
    };

    if let Err(e) = &result {
        tracing::error!("Run failed [{}]: {}", e.kind(), e);
    }
    result
}
