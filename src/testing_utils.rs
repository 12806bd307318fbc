use crate::data_fetcher::models::{GameRecord, GameResult, PlayerStatRecord};
use chrono::NaiveDate;

/// Test utilities for creating records without going through the API
pub struct TestDataBuilder;

impl TestDataBuilder {
    /// Creates a finished game for the given id and date
    pub fn create_game(game_id: &str, date: NaiveDate, result: GameResult) -> GameRecord {
        GameRecord {
            game_id: game_id.to_string(),
            game_date: date,
            matchup: "MIN vs. NOP".to_string(),
            result,
            wins: 20,
            losses: 19,
            team_points: 112,
            team_fg_pct: Some(0.478),
            team_ft_pct: Some(0.81),
            team_rebounds: 44,
            team_assists: 27,
            team_turnovers: 13,
        }
    }

    /// Creates a box score line for a player who logged minutes
    pub fn create_player_line(game_id: &str, player_id: u64, name: &str) -> PlayerStatRecord {
        PlayerStatRecord {
            game_id: game_id.to_string(),
            player_id,
            player_name: name.to_string(),
            team_id: 1610612750,
            team_abbr: "MIN".to_string(),
            minutes: "31:40".to_string(),
            points: 18,
            fg_made: 7,
            fg_attempts: 15,
            fg_pct: Some(0.467),
            fg3_made: 2,
            fg3_attempts: 6,
            fg3_pct: Some(0.333),
            ft_made: 2,
            ft_attempts: 2,
            ft_pct: Some(1.0),
            offensive_rebounds: 1,
            defensive_rebounds: 5,
            total_rebounds: 6,
            assists: 4,
            steals: 1,
            blocks: 0,
            turnovers: 2,
        }
    }
}

/// JSON payloads shaped like the stats API responses.
pub mod fixtures {
    use serde_json::{Value, json};

    pub const TEAM_ID: u64 = 1610612750;

    pub const GAME_LOG_HEADERS: [&str; 27] = [
        "Team_ID", "Game_ID", "GAME_DATE", "MATCHUP", "WL", "W", "L", "W_PCT", "MIN", "FGM",
        "FGA", "FG_PCT", "FG3M", "FG3A", "FG3_PCT", "FTM", "FTA", "FT_PCT", "OREB", "DREB", "REB",
        "AST", "STL", "BLK", "TOV", "PF", "PTS",
    ];

    pub const BOX_SCORE_HEADERS: [&str; 29] = [
        "GAME_ID",
        "TEAM_ID",
        "TEAM_ABBREVIATION",
        "TEAM_CITY",
        "PLAYER_ID",
        "PLAYER_NAME",
        "NICKNAME",
        "START_POSITION",
        "COMMENT",
        "MIN",
        "FGM",
        "FGA",
        "FG_PCT",
        "FG3M",
        "FG3A",
        "FG3_PCT",
        "FTM",
        "FTA",
        "FT_PCT",
        "OREB",
        "DREB",
        "REB",
        "AST",
        "STL",
        "BLK",
        "TO",
        "PF",
        "PTS",
        "PLUS_MINUS",
    ];

    /// One game log row in `GAME_LOG_HEADERS` order
    pub fn game_row(game_id: &str, date: &str, matchup: &str, wl: &str, points: u32) -> Vec<Value> {
        vec![
            json!(TEAM_ID),
            json!(game_id),
            json!(date),
            json!(matchup),
            json!(wl),
            json!(20),
            json!(19),
            json!(0.513),
            json!(240),
            json!(42),
            json!(84),
            json!(0.5),
            json!(14),
            json!(38),
            json!(0.368),
            json!(21),
            json!(26),
            json!(0.808),
            json!(10),
            json!(34),
            json!(44),
            json!(27),
            json!(8),
            json!(5),
            json!(13),
            json!(19),
            json!(points),
        ]
    }

    /// One box score row in `BOX_SCORE_HEADERS` order; `minutes: None` is a DNP
    pub fn player_row(
        game_id: &str,
        player_id: u64,
        name: &str,
        minutes: Option<&str>,
        points: u32,
    ) -> Vec<Value> {
        let played = minutes.is_some();
        let stat = |v: u32| if played { json!(v) } else { Value::Null };
        vec![
            json!(game_id),
            json!(TEAM_ID),
            json!("MIN"),
            json!("Minnesota"),
            json!(player_id),
            json!(name),
            json!(name.split_whitespace().next().unwrap_or(name)),
            json!(""),
            if played { json!("") } else { json!("DNP - Coach's Decision") },
            minutes.map(|m| json!(m)).unwrap_or(Value::Null),
            stat(7),
            stat(15),
            if played { json!(0.467) } else { Value::Null },
            stat(2),
            stat(6),
            if played { json!(0.333) } else { Value::Null },
            stat(2),
            stat(2),
            if played { json!(1.0) } else { Value::Null },
            stat(1),
            stat(5),
            stat(6),
            stat(4),
            stat(1),
            stat(0),
            stat(2),
            stat(3),
            stat(points),
            stat(5),
        ]
    }

    /// Full `teamgamelog` response
    pub fn team_game_log(rows: &[Vec<Value>]) -> Value {
        json!({
            "resource": "teamgamelog",
            "parameters": {"TeamID": TEAM_ID, "Season": "2024-25", "SeasonType": "Regular Season"},
            "resultSets": [{
                "name": "TeamGameLog",
                "headers": GAME_LOG_HEADERS,
                "rowSet": rows,
            }]
        })
    }

    /// Full `boxscoretraditionalv2` response
    pub fn box_score(game_id: &str, rows: &[Vec<Value>]) -> Value {
        json!({
            "resource": "boxscore",
            "parameters": {"GameID": game_id},
            "resultSets": [
                {
                    "name": "PlayerStats",
                    "headers": BOX_SCORE_HEADERS,
                    "rowSet": rows,
                },
                {
                    "name": "TeamStats",
                    "headers": ["GAME_ID", "TEAM_ID"],
                    "rowSet": [],
                }
            ]
        })
    }
}
