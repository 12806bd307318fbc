//! URL building utilities for the stats API endpoints

/// Builds the team game log URL for a regular season.
///
/// # Example
/// ```
/// use nba_pipeline::data_fetcher::api::build_team_game_log_url;
///
/// let url = build_team_game_log_url("https://stats.example.com/stats", "1610612750", "2024-25");
/// assert_eq!(
///     url,
///     "https://stats.example.com/stats/teamgamelog?TeamID=1610612750&Season=2024-25&SeasonType=Regular+Season"
/// );
/// ```
pub fn build_team_game_log_url(api_base_url: &str, team_id: &str, season: &str) -> String {
    format!(
        "{}/teamgamelog?TeamID={team_id}&Season={season}&SeasonType=Regular+Season",
        api_base_url.trim_end_matches('/')
    )
}

/// Builds the traditional box score URL covering the whole game, overtimes included.
///
/// # Example
/// ```
/// use nba_pipeline::data_fetcher::api::build_box_score_url;
///
/// let url = build_box_score_url("https://stats.example.com/stats/", "0022400571");
/// assert_eq!(
///     url,
///     "https://stats.example.com/stats/boxscoretraditionalv2?GameID=0022400571&StartPeriod=0&EndPeriod=10&StartRange=0&EndRange=28800&RangeType=0"
/// );
/// ```
pub fn build_box_score_url(api_base_url: &str, game_id: &str) -> String {
    format!(
        "{}/boxscoretraditionalv2?GameID={game_id}&StartPeriod=0&EndPeriod=10&StartRange=0&EndRange=28800&RangeType=0",
        api_base_url.trim_end_matches('/')
    )
}
