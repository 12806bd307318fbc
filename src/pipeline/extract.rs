use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::partition::{ManifestFile, RunManifest, RunPartition, write_atomically};
use crate::config::{Config, ExtractScope};
use crate::constants::REGULAR_SEASON_GAMES;
use crate::data_fetcher::StatsApi;
use crate::data_fetcher::models::{GameRecord, PlayerStatRecord, TableRecord};
use crate::error::AppError;
use crate::warehouse::TargetTable;

/// Keeps the games a run of `scope` covers on `run_date`.
pub fn games_in_scope(games: Vec<GameRecord>, scope: ExtractScope, run_date: NaiveDate) -> Vec<GameRecord> {
    games
        .into_iter()
        .filter(|game| match scope {
            ExtractScope::Season => game.game_date <= run_date,
            ExtractScope::Day => game.game_date == run_date,
        })
        .collect()
}

/// Pulls the game log and every box score for the configured team and season,
/// then writes `games.csv`, `player_stats.csv` and the manifest into the
/// run-date partition.
///
/// Nothing is written until every upstream call has succeeded, so a failed
/// extraction leaves an earlier partition untouched.
pub async fn extract(
    api: &StatsApi,
    config: &Config,
    partition: &RunPartition,
) -> Result<RunManifest, AppError> {
    let run_date = partition.run_date();
    let season_games = api
        .fetch_team_game_log(&config.team_id, &config.season)
        .await?;
    let games = games_in_scope(season_games, config.scope, run_date);

    info!(
        "Extracting {} game(s) for team {} ({}, scope {}, run date {})",
        games.len(),
        config.team_id,
        config.season,
        config.scope.as_str(),
        run_date
    );
    if games.len() > REGULAR_SEASON_GAMES {
        warn!(
            "Game log holds {} games, more than a regular season ({REGULAR_SEASON_GAMES})",
            games.len()
        );
    }
    if games.is_empty() {
        warn!("No games to extract for {run_date}");
    }

    let interval = Duration::from_millis(config.request_interval_ms);
    let mut players = Vec::new();
    let mut seen = HashSet::new();
    for (index, game) in games.iter().enumerate() {
        if index > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        let lines = api.fetch_box_score(&game.game_id).await?;
        if lines.is_empty() {
            warn!("Game {} has no box score rows yet", game.game_id);
        }
        debug!("Game {}: {} player rows", game.game_id, lines.len());
        players.extend(lines.into_iter().filter(|line| seen.insert(line.key())));
    }

    partition.ensure_dir().await?;
    write_csv(&partition.file_path(TargetTable::Games), &games).await?;
    write_csv(&partition.file_path(TargetTable::PlayerStats), &players).await?;

    let manifest = RunManifest {
        run_date,
        team_id: config.team_id.clone(),
        season: config.season.clone(),
        scope: config.scope,
        off_season: config.off_season,
        extracted_at: Utc::now(),
        files: vec![
            ManifestFile {
                table: TargetTable::Games,
                file_name: TargetTable::Games.file_name().to_string(),
                rows: games.len(),
            },
            ManifestFile {
                table: TargetTable::PlayerStats,
                file_name: TargetTable::PlayerStats.file_name().to_string(),
                rows: players.len(),
            },
        ],
    };
    manifest.write(partition).await?;

    info!(
        "Extracted {} games and {} player rows into {}",
        games.len(),
        players.len(),
        partition.dir().display()
    );
    Ok(manifest)
}

/// Serializes `records` under the record type's header. The header is written
/// even when there are no rows.
async fn write_csv<R: TableRecord + Serialize>(path: &Path, records: &[R]) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(R::HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))?;
    write_atomically(path, &bytes).await
}
