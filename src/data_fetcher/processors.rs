use crate::data_fetcher::models::{GameRecord, GameResult, PlayerStatRecord, Row};
use chrono::NaiveDate;

/// Why a row could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    /// A required column is missing or null.
    Missing(&'static str),
    /// A column holds a value of the wrong shape.
    Invalid { column: &'static str, value: String },
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowIssue::Missing(column) => write!(f, "missing value for {column}"),
            RowIssue::Invalid { column, value } => write!(f, "invalid value '{value}' for {column}"),
        }
    }
}

fn required_text(row: &Row<'_>, column: &'static str) -> Result<String, RowIssue> {
    row.text(column)
        .filter(|s| !s.is_empty())
        .ok_or(RowIssue::Missing(column))
}

fn required_count(row: &Row<'_>, column: &'static str) -> Result<u32, RowIssue> {
    row.count(column).ok_or(RowIssue::Missing(column))
}

fn required_id(row: &Row<'_>, column: &'static str) -> Result<u64, RowIssue> {
    row.id(column).ok_or(RowIssue::Missing(column))
}

/// Parses the game log date. The API sends `JAN 15, 2025`; ISO dates are
/// accepted as well since some endpoints use `2025-01-15T00:00:00`.
pub fn parse_game_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%b %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(value.get(..10).unwrap_or(value), "%Y-%m-%d"))
        .ok()
}

/// Normalizes playing time to `MM:SS`.
///
/// Box scores report `36:12`, occasionally `36.000000:12`, and null or an
/// empty string for players who did not play. Returns `None` when the player
/// logged no time.
pub fn normalize_minutes(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let (minutes, seconds) = match value.split_once(':') {
        Some((m, s)) => (m, s),
        None => (value, "0"),
    };
    let minutes = minutes.parse::<f64>().ok()?.trunc() as u32;
    let seconds = seconds.parse::<f64>().ok()?.trunc() as u32;

    if minutes == 0 && seconds == 0 {
        return None;
    }
    Some(format!("{minutes:02}:{seconds:02}"))
}

/// Converts one `TeamGameLog` row into a [`GameRecord`], selecting and
/// renaming the columns the warehouse keeps.
///
/// Returns `Ok(None)` for a game without a final result (still in progress).
pub fn game_record_from_row(row: &Row<'_>) -> Result<Option<GameRecord>, RowIssue> {
    let Some(result) = row.text("WL").filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let result = GameResult::parse(&result).ok_or_else(|| RowIssue::Invalid {
        column: "WL",
        value: result.clone(),
    })?;

    let raw_date = required_text(row, "GAME_DATE")?;
    let game_date = parse_game_date(&raw_date).ok_or_else(|| RowIssue::Invalid {
        column: "GAME_DATE",
        value: raw_date.clone(),
    })?;

    Ok(Some(GameRecord {
        game_id: required_text(row, "Game_ID")?,
        game_date,
        matchup: required_text(row, "MATCHUP")?,
        result,
        wins: required_count(row, "W")?,
        losses: required_count(row, "L")?,
        team_points: required_count(row, "PTS")?,
        team_fg_pct: row.number("FG_PCT"),
        team_ft_pct: row.number("FT_PCT"),
        team_rebounds: required_count(row, "REB")?,
        team_assists: required_count(row, "AST")?,
        team_turnovers: required_count(row, "TOV")?,
    }))
}

/// Converts one `PlayerStats` box score row into a [`PlayerStatRecord`].
///
/// Returns `Ok(None)` for players who did not log minutes. Counting stats
/// that are null for a player who did play are recorded as zero.
pub fn player_record_from_row(
    row: &Row<'_>,
    game_id: &str,
) -> Result<Option<PlayerStatRecord>, RowIssue> {
    let Some(minutes) = normalize_minutes(row.text("MIN")) else {
        return Ok(None);
    };

    let count = |column: &str| row.count(column).unwrap_or(0);

    Ok(Some(PlayerStatRecord {
        game_id: game_id.to_string(),
        player_id: required_id(row, "PLAYER_ID")?,
        player_name: required_text(row, "PLAYER_NAME")?,
        team_id: required_id(row, "TEAM_ID")?,
        team_abbr: required_text(row, "TEAM_ABBREVIATION")?,
        minutes,
        points: count("PTS"),
        fg_made: count("FGM"),
        fg_attempts: count("FGA"),
        fg_pct: row.number("FG_PCT"),
        fg3_made: count("FG3M"),
        fg3_attempts: count("FG3A"),
        fg3_pct: row.number("FG3_PCT"),
        ft_made: count("FTM"),
        ft_attempts: count("FTA"),
        ft_pct: row.number("FT_PCT"),
        offensive_rebounds: count("OREB"),
        defensive_rebounds: count("DREB"),
        total_rebounds: count("REB"),
        assists: count("AST"),
        steals: count("STL"),
        blocks: count("BLK"),
        turnovers: count("TO"),
    }))
}

/// Converts a whole box score, skipping players without minutes.
///
/// Fails on the first row of a player with minutes that cannot be converted,
/// returning its index with the issue.
pub fn player_records_from_rows<'a>(
    rows: impl Iterator<Item = Row<'a>>,
    game_id: &str,
) -> Result<Vec<PlayerStatRecord>, (usize, RowIssue)> {
    let mut records = Vec::new();
    for (i, row) in rows.enumerate() {
        if let Some(record) = player_record_from_row(&row, game_id).map_err(|issue| (i, issue))? {
            records.push(record);
        }
    }
    Ok(records)
}
