use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use nba_pipeline::config::ExtractScope;
use nba_pipeline::pipeline::Step;

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .usage(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// Logs go to stdout as well as the log file, except for a daemon without
/// --debug, which logs to file only.
pub fn logs_to_stdout(args: &Args) -> bool {
    !args.daemon || args.debug
}

/// NBA team stats pipeline
///
/// Pulls a team's regular season game log and per-player box scores from the
/// stats API, writes them as CSV files into a run-date partition, validates
/// them, stages them and loads them into the warehouse.
///
/// Without options, runs once for today's date (UTC) and exits.
/// With --daemon, runs every day at the configured trigger time.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(styles = get_styles())]
pub struct Args {
    /// Run date in YYYY-MM-DD format. Defaults to today (UTC).
    #[arg(long = "date", short = 'd', help_heading = "Run Options")]
    pub date: Option<String>,

    /// Team id to extract, e.g. 1610612750. Overrides the config file.
    #[arg(long = "team-id", short = 't', help_heading = "Run Options")]
    pub team_id: Option<String>,

    /// Season in YYYY-YY format, e.g. 2024-25. Overrides the config file.
    #[arg(long = "season", short = 's', help_heading = "Run Options")]
    pub season: Option<String>,

    /// Which games to extract: every game up to the run date, or only the run date.
    #[arg(long = "scope", value_enum, help_heading = "Run Options")]
    pub scope: Option<ExtractScope>,

    /// Accept an empty game log (season not started or already over).
    #[arg(long = "off-season", help_heading = "Run Options")]
    pub off_season: bool,

    /// Resume at this step, reusing files produced by earlier steps.
    #[arg(
        long = "from-step",
        value_enum,
        default_value = "extract",
        help_heading = "Run Options"
    )]
    pub from_step: Step,

    /// Keep running and trigger a run every day at the configured UTC time.
    #[arg(long = "daemon", help_heading = "Run Options", conflicts_with_all = ["date", "from_step"])]
    pub daemon: bool,

    /// Path to the config file. Defaults to the platform config directory.
    #[arg(long = "config", short = 'c', help_heading = "Configuration")]
    pub config: Option<String>,

    /// List current configuration settings
    #[arg(long = "list-config", short = 'l', help_heading = "Configuration")]
    pub list_config: bool,

    /// Also log to stdout in daemon mode and lower the default level to debug.
    #[arg(long = "debug", help_heading = "Debug")]
    pub debug: bool,

    /// Specify a custom log file path. If not provided, logs will be written to the default location.
    #[arg(long = "log-file", help_heading = "Debug")]
    pub log_file: Option<String>,
}
