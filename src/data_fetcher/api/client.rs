use reqwest::Client;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use super::fetch_utils::fetch;
use super::http_client::create_http_client_with_timeout;
use super::urls::{build_box_score_url, build_team_game_log_url};
use crate::config::Config;
use crate::data_fetcher::models::{GameRecord, PlayerStatRecord, StatsResponse};
use crate::data_fetcher::processors::{game_record_from_row, player_records_from_rows};
use crate::error::AppError;
use crate::retry::RetryPolicy;

const GAME_LOG_SET: &str = "TeamGameLog";
const PLAYER_STATS_SET: &str = "PlayerStats";

/// Read-only client for the two stats endpoints the pipeline needs.
#[derive(Debug, Clone)]
pub struct StatsApi {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl StatsApi {
    /// Builds a client from the configured base URL, timeout and retry budget.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = create_http_client_with_timeout(config.http_timeout_seconds)?;
        Ok(Self::with_client(
            client,
            &config.api_base_url,
            RetryPolicy::from_settings(&config.retry),
        ))
    }

    pub fn with_client(client: Client, base_url: &str, policy: RetryPolicy) -> Self {
        StatsApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches the team's regular season game log.
    ///
    /// Games without a final result are left out. Rows come back oldest
    /// first, ordered by date then game id, with duplicate ids dropped.
    /// An empty log (season not started) is an empty vector, not an error.
    #[instrument(skip(self))]
    pub async fn fetch_team_game_log(
        &self,
        team_id: &str,
        season: &str,
    ) -> Result<Vec<GameRecord>, AppError> {
        let url = build_team_game_log_url(&self.base_url, team_id, season);
        info!("Fetching games for team {team_id} in {season}");

        let response: StatsResponse = fetch(&self.client, &url, &self.policy, "team game log").await?;
        let set = response.result_set(GAME_LOG_SET).ok_or_else(|| {
            AppError::api_unexpected_structure(format!("no {GAME_LOG_SET} result set"), &url)
        })?;

        let mut seen = HashSet::new();
        let mut games = Vec::with_capacity(set.len());
        for (i, row) in set.rows().enumerate() {
            let record = game_record_from_row(&row).map_err(|issue| {
                AppError::api_unexpected_structure(format!("game log row {i}: {issue}"), &url)
            })?;
            match record {
                Some(game) if seen.insert(game.game_id.clone()) => games.push(game),
                Some(game) => warn!("Duplicate game {} in game log, keeping first", game.game_id),
                None => debug!("Game log row {i} has no result yet, skipping"),
            }
        }

        games.sort_by(|a, b| {
            a.game_date
                .cmp(&b.game_date)
                .then_with(|| a.game_id.cmp(&b.game_id))
        });

        info!("Fetched game log with {} games", games.len());
        Ok(games)
    }

    /// Fetches the box score of one game, keeping players who logged minutes.
    ///
    /// A game without player stats (postponed, not yet published) yields an
    /// empty vector so the rest of the run can continue.
    #[instrument(skip(self))]
    pub async fn fetch_box_score(&self, game_id: &str) -> Result<Vec<PlayerStatRecord>, AppError> {
        let url = build_box_score_url(&self.base_url, game_id);

        let response: StatsResponse = fetch(&self.client, &url, &self.policy, "box score").await?;
        let Some(set) = response.result_set(PLAYER_STATS_SET) else {
            info!("Game {game_id} has no {PLAYER_STATS_SET} result set, emitting no player rows");
            return Ok(Vec::new());
        };

        let players = player_records_from_rows(set.rows(), game_id).map_err(|(i, issue)| {
            AppError::api_unexpected_structure(format!("box score row {i}: {issue}"), &url)
        })?;
        debug!(
            "Game {game_id}: {} box score rows, {} players with minutes",
            set.len(),
            players.len()
        );
        Ok(players)
    }
}
