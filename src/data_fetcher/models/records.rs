use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row type with a fixed CSV schema.
pub trait TableRecord: Serialize + DeserializeOwned {
    /// Column names in file order; must match the serialized field order.
    const HEADER: &'static [&'static str];

    /// Natural key, unique within the table.
    fn key(&self) -> String;
}

/// Final outcome of a game from the team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    W,
    L,
}

impl GameResult {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "W" => Some(GameResult::W),
            "L" => Some(GameResult::L),
            _ => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::W => f.write_str("W"),
            GameResult::L => f.write_str("L"),
        }
    }
}

/// One row of `games.csv`. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub game_date: NaiveDate,
    pub matchup: String,
    pub result: GameResult,
    pub wins: u32,
    pub losses: u32,
    pub team_points: u32,
    pub team_fg_pct: Option<f64>,
    pub team_ft_pct: Option<f64>,
    pub team_rebounds: u32,
    pub team_assists: u32,
    pub team_turnovers: u32,
}

impl TableRecord for GameRecord {
    const HEADER: &'static [&'static str] = &[
        "game_id",
        "game_date",
        "matchup",
        "result",
        "wins",
        "losses",
        "team_points",
        "team_fg_pct",
        "team_ft_pct",
        "team_rebounds",
        "team_assists",
        "team_turnovers",
    ];

    fn key(&self) -> String {
        self.game_id.clone()
    }
}

/// One row of `player_stats.csv`, keyed by `(game_id, player_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatRecord {
    pub game_id: String,
    pub player_id: u64,
    pub player_name: String,
    pub team_id: u64,
    pub team_abbr: String,
    /// Playing time as `MM:SS`
    pub minutes: String,
    pub points: u32,
    pub fg_made: u32,
    pub fg_attempts: u32,
    pub fg_pct: Option<f64>,
    pub fg3_made: u32,
    pub fg3_attempts: u32,
    pub fg3_pct: Option<f64>,
    pub ft_made: u32,
    pub ft_attempts: u32,
    pub ft_pct: Option<f64>,
    pub offensive_rebounds: u32,
    pub defensive_rebounds: u32,
    pub total_rebounds: u32,
    pub assists: u32,
    pub steals: u32,
    pub blocks: u32,
    pub turnovers: u32,
}

impl TableRecord for PlayerStatRecord {
    const HEADER: &'static [&'static str] = &[
        "game_id",
        "player_id",
        "player_name",
        "team_id",
        "team_abbr",
        "minutes",
        "points",
        "fg_made",
        "fg_attempts",
        "fg_pct",
        "fg3_made",
        "fg3_attempts",
        "fg3_pct",
        "ft_made",
        "ft_attempts",
        "ft_pct",
        "offensive_rebounds",
        "defensive_rebounds",
        "total_rebounds",
        "assists",
        "steals",
        "blocks",
        "turnovers",
    ];

    fn key(&self) -> String {
        format!("{}:{}", self.game_id, self.player_id)
    }
}
