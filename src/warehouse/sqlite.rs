use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, Statement, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::{LoadReport, StagedFile, TargetTable, Warehouse};
use crate::config::WarehouseSettings;
use crate::data_fetcher::models::{GameRecord, PlayerStatRecord, TableRecord};
use crate::error::AppError;
use crate::pipeline::partition::partition_key;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS games (
    game_id         TEXT PRIMARY KEY,
    game_date       TEXT NOT NULL,
    matchup         TEXT NOT NULL,
    result          TEXT NOT NULL CHECK (result IN ('W', 'L')),
    wins            INTEGER NOT NULL,
    losses          INTEGER NOT NULL,
    team_points     INTEGER NOT NULL,
    team_fg_pct     REAL,
    team_ft_pct     REAL,
    team_rebounds   INTEGER NOT NULL,
    team_assists    INTEGER NOT NULL,
    team_turnovers  INTEGER NOT NULL,
    run_date        TEXT NOT NULL,
    loaded_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_games_run_date ON games(run_date);

CREATE TABLE IF NOT EXISTS player_stats (
    game_id             TEXT NOT NULL,
    player_id           INTEGER NOT NULL,
    player_name         TEXT NOT NULL,
    team_id             INTEGER NOT NULL,
    team_abbr           TEXT NOT NULL,
    minutes             TEXT NOT NULL,
    points              INTEGER NOT NULL,
    fg_made             INTEGER NOT NULL,
    fg_attempts         INTEGER NOT NULL,
    fg_pct              REAL,
    fg3_made            INTEGER NOT NULL,
    fg3_attempts        INTEGER NOT NULL,
    fg3_pct             REAL,
    ft_made             INTEGER NOT NULL,
    ft_attempts         INTEGER NOT NULL,
    ft_pct              REAL,
    offensive_rebounds  INTEGER NOT NULL,
    defensive_rebounds  INTEGER NOT NULL,
    total_rebounds      INTEGER NOT NULL,
    assists             INTEGER NOT NULL,
    steals              INTEGER NOT NULL,
    blocks              INTEGER NOT NULL,
    turnovers           INTEGER NOT NULL,
    run_date            TEXT NOT NULL,
    loaded_at           TEXT NOT NULL,
    PRIMARY KEY (game_id, player_id)
);
CREATE INDEX IF NOT EXISTS idx_player_stats_run_date ON player_stats(run_date);
";

/// A record type that knows how to upsert itself into its table.
trait SqlRow: TableRecord {
    const UPSERT: &'static str;

    fn upsert(
        &self,
        stmt: &mut Statement<'_>,
        run_date: &str,
        loaded_at: &str,
    ) -> rusqlite::Result<usize>;
}

impl SqlRow for GameRecord {
    const UPSERT: &'static str = "
        INSERT INTO games (
            game_id, game_date, matchup, result, wins, losses, team_points,
            team_fg_pct, team_ft_pct, team_rebounds, team_assists, team_turnovers,
            run_date, loaded_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT (game_id) DO UPDATE SET
            game_date = excluded.game_date,
            matchup = excluded.matchup,
            result = excluded.result,
            wins = excluded.wins,
            losses = excluded.losses,
            team_points = excluded.team_points,
            team_fg_pct = excluded.team_fg_pct,
            team_ft_pct = excluded.team_ft_pct,
            team_rebounds = excluded.team_rebounds,
            team_assists = excluded.team_assists,
            team_turnovers = excluded.team_turnovers,
            run_date = excluded.run_date,
            loaded_at = excluded.loaded_at";

    fn upsert(
        &self,
        stmt: &mut Statement<'_>,
        run_date: &str,
        loaded_at: &str,
    ) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.game_id,
            self.game_date.to_string(),
            self.matchup,
            self.result.to_string(),
            self.wins,
            self.losses,
            self.team_points,
            self.team_fg_pct,
            self.team_ft_pct,
            self.team_rebounds,
            self.team_assists,
            self.team_turnovers,
            run_date,
            loaded_at,
        ])
    }
}

impl SqlRow for PlayerStatRecord {
    const UPSERT: &'static str = "
        INSERT INTO player_stats (
            game_id, player_id, player_name, team_id, team_abbr, minutes, points,
            fg_made, fg_attempts, fg_pct, fg3_made, fg3_attempts, fg3_pct,
            ft_made, ft_attempts, ft_pct, offensive_rebounds, defensive_rebounds,
            total_rebounds, assists, steals, blocks, turnovers, run_date, loaded_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
            ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
        )
        ON CONFLICT (game_id, player_id) DO UPDATE SET
            player_name = excluded.player_name,
            team_id = excluded.team_id,
            team_abbr = excluded.team_abbr,
            minutes = excluded.minutes,
            points = excluded.points,
            fg_made = excluded.fg_made,
            fg_attempts = excluded.fg_attempts,
            fg_pct = excluded.fg_pct,
            fg3_made = excluded.fg3_made,
            fg3_attempts = excluded.fg3_attempts,
            fg3_pct = excluded.fg3_pct,
            ft_made = excluded.ft_made,
            ft_attempts = excluded.ft_attempts,
            ft_pct = excluded.ft_pct,
            offensive_rebounds = excluded.offensive_rebounds,
            defensive_rebounds = excluded.defensive_rebounds,
            total_rebounds = excluded.total_rebounds,
            assists = excluded.assists,
            steals = excluded.steals,
            blocks = excluded.blocks,
            turnovers = excluded.turnovers,
            run_date = excluded.run_date,
            loaded_at = excluded.loaded_at";

    fn upsert(
        &self,
        stmt: &mut Statement<'_>,
        run_date: &str,
        loaded_at: &str,
    ) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.game_id,
            self.player_id as i64,
            self.player_name,
            self.team_id as i64,
            self.team_abbr,
            self.minutes,
            self.points,
            self.fg_made,
            self.fg_attempts,
            self.fg_pct,
            self.fg3_made,
            self.fg3_attempts,
            self.fg3_pct,
            self.ft_made,
            self.ft_attempts,
            self.ft_pct,
            self.offensive_rebounds,
            self.defensive_rebounds,
            self.total_rebounds,
            self.assists,
            self.steals,
            self.blocks,
            self.turnovers,
            run_date,
            loaded_at,
        ])
    }
}

/// Embedded SQLite warehouse with a plain directory as its staging area.
///
/// Every operation opens its own connection on the blocking pool, so the
/// handle is cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct SqliteWarehouse {
    database_path: PathBuf,
    stage_dir: PathBuf,
}

impl SqliteWarehouse {
    /// Creates the database file, the stage directory and the target tables
    /// if they do not exist yet.
    pub fn open(
        database_path: impl Into<PathBuf>,
        stage_dir: impl Into<PathBuf>,
    ) -> Result<Self, AppError> {
        let warehouse = SqliteWarehouse {
            database_path: database_path.into(),
            stage_dir: stage_dir.into(),
        };

        if let Some(parent) = warehouse.database_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&warehouse.stage_dir)?;

        let conn = warehouse.connect()?;
        conn.execute_batch(SCHEMA)?;
        debug!(
            "Warehouse ready at {} (stage: {})",
            warehouse.database_path.display(),
            warehouse.stage_dir.display()
        );
        Ok(warehouse)
    }

    pub fn from_settings(settings: &WarehouseSettings) -> Result<Self, AppError> {
        Self::open(&settings.database_path, &settings.stage_dir)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    fn connect(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.database_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn staged_location(&self, table: TargetTable, run_date: NaiveDate) -> PathBuf {
        self.stage_dir
            .join(partition_key(run_date))
            .join(table.file_name())
    }
}

impl Warehouse for SqliteWarehouse {
    #[instrument(skip(self))]
    async fn stage_file(
        &self,
        local: &Path,
        table: TargetTable,
        run_date: NaiveDate,
        expected_rows: usize,
    ) -> Result<StagedFile, AppError> {
        let source = local.display().to_string();
        let transport = |e: std::io::Error| AppError::staging_transport(&source, e.to_string());

        let location = self.staged_location(table, run_date);
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).await.map_err(transport)?;
        }

        // Copy next to the target, then rename over any earlier upload.
        let partial = location.with_extension("csv.part");
        let copied = fs::copy(local, &partial).await.map_err(transport)?;
        let source_len = fs::metadata(local).await.map_err(transport)?.len();
        if copied != source_len {
            let _ = fs::remove_file(&partial).await;
            return Err(AppError::staging_transport(
                &source,
                format!("short copy: {copied} of {source_len} bytes"),
            ));
        }
        fs::rename(&partial, &location).await.map_err(transport)?;

        info!(
            "Staged {} ({} rows, {} bytes) to {}",
            source,
            expected_rows,
            copied,
            location.display()
        );

        Ok(StagedFile {
            table,
            run_date,
            location,
            expected_rows,
        })
    }

    async fn staged_file(
        &self,
        table: TargetTable,
        run_date: NaiveDate,
        expected_rows: usize,
    ) -> Result<StagedFile, AppError> {
        let location = self.staged_location(table, run_date);
        if !fs::try_exists(&location).await.unwrap_or(false) {
            return Err(AppError::staging_transport(
                location.display().to_string(),
                "nothing staged for this run date",
            ));
        }
        Ok(StagedFile {
            table,
            run_date,
            location,
            expected_rows,
        })
    }

    #[instrument(skip(self, staged), fields(table = %staged.table, run_date = %staged.run_date))]
    async fn load_file(&self, staged: &StagedFile) -> Result<LoadReport, AppError> {
        let warehouse = self.clone();
        let staged = staged.clone();
        tokio::task::spawn_blocking(move || -> Result<LoadReport, AppError> {
            let mut conn = warehouse.connect()?;
            let report = match staged.table {
                TargetTable::Games => load_partition::<GameRecord>(&mut conn, &staged)?,
                TargetTable::PlayerStats => load_partition::<PlayerStatRecord>(&mut conn, &staged)?,
            };
            if report.rows_loaded != staged.expected_rows {
                warn!(
                    "Loaded {} rows into {} but {} were extracted",
                    report.rows_loaded, staged.table, staged.expected_rows
                );
            }
            Ok(report)
        })
        .await?
    }

    async fn row_count(&self, table: TargetTable) -> Result<u64, AppError> {
        let warehouse = self.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, AppError> {
            let conn = warehouse.connect()?;
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", table.table_name()),
                [],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await?
    }
}

/// Replaces everything previously loaded for the staged file's run date with
/// the file's rows, in one transaction.
///
/// Any header mismatch or undecodable row aborts before commit, which rolls
/// the whole file back.
fn load_partition<R: SqlRow>(
    conn: &mut Connection,
    staged: &StagedFile,
) -> Result<LoadReport, AppError> {
    let table = staged.table.table_name();

    let mut reader = csv::Reader::from_path(&staged.location).map_err(|e| {
        AppError::staging_transport(staged.location.display().to_string(), e.to_string())
    })?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::load_schema(table, 1, e.to_string()))?
        .clone();
    if !headers.iter().eq(R::HEADER.iter().copied()) {
        return Err(AppError::load_schema(
            table,
            1,
            format!(
                "header mismatch: expected [{}], found [{}]",
                R::HEADER.join(","),
                headers.iter().collect::<Vec<_>>().join(",")
            ),
        ));
    }

    let run_date = staged.run_date.to_string();
    let loaded_at = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    let rows_replaced = tx.execute(
        &format!("DELETE FROM {table} WHERE run_date = ?1"),
        params![run_date],
    )?;

    let mut rows_loaded = 0usize;
    {
        let mut stmt = tx.prepare(R::UPSERT)?;
        for (index, row) in reader.deserialize::<R>().enumerate() {
            let line = index as u64 + 2;
            let record = row.map_err(|e| AppError::load_schema(table, line, e.to_string()))?;
            record
                .upsert(&mut stmt, &run_date, &loaded_at)
                .map_err(|e| AppError::load_schema(table, line, e.to_string()))?;
            rows_loaded += 1;
        }
    }
    tx.commit()?;

    info!(
        "Loaded {rows_loaded} rows into {table} for {run_date} (replaced {rows_replaced})"
    );

    Ok(LoadReport {
        table: staged.table,
        run_date: staged.run_date,
        rows_loaded,
        rows_replaced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing_utils::TestDataBuilder;
    use crate::data_fetcher::models::GameResult;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn warehouse_in(dir: &TempDir) -> SqliteWarehouse {
        SqliteWarehouse::open(dir.path().join("wh.db"), dir.path().join("stage")).unwrap()
    }

    fn write_games(path: &Path, games: &[GameRecord]) {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        writer.write_record(GameRecord::HEADER).unwrap();
        for game in games {
            writer.serialize(game).unwrap();
        }
        writer.flush().unwrap();
    }

    fn games(ids: &[&str]) -> Vec<GameRecord> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| TestDataBuilder::create_game(id, date(2025, 1, 10 + i as u32), GameResult::W))
            .collect()
    }

    async fn stage_and_load(
        warehouse: &SqliteWarehouse,
        local: &Path,
        run_date: NaiveDate,
        rows: usize,
    ) -> Result<LoadReport, AppError> {
        let staged = warehouse
            .stage_file(local, TargetTable::Games, run_date, rows)
            .await?;
        warehouse.load_file(&staged).await
    }

    #[tokio::test]
    async fn test_stage_overwrites_previous_file() {
        let dir = TempDir::new().unwrap();
        let warehouse = warehouse_in(&dir);
        let local = dir.path().join("games.csv");

        write_games(&local, &games(&["0022400001", "0022400002"]));
        let first = warehouse
            .stage_file(&local, TargetTable::Games, date(2025, 1, 15), 2)
            .await
            .unwrap();

        write_games(&local, &games(&["0022400001"]));
        let second = warehouse
            .stage_file(&local, TargetTable::Games, date(2025, 1, 15), 1)
            .await
            .unwrap();

        assert_eq!(first.location, second.location);
        assert!(second.location.ends_with("20250115/games.csv"));
        let staged = std::fs::read_to_string(&second.location).unwrap();
        assert_eq!(staged.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_stage_missing_source_is_staging_error() {
        let dir = TempDir::new().unwrap();
        let warehouse = warehouse_in(&dir);

        let err = warehouse
            .stage_file(&dir.path().join("nope.csv"), TargetTable::Games, date(2025, 1, 15), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StagingTransport);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_reload_same_run_date_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let warehouse = warehouse_in(&dir);
        let local = dir.path().join("games.csv");
        write_games(&local, &games(&["0022400001", "0022400002", "0022400003"]));

        let first = stage_and_load(&warehouse, &local, date(2025, 1, 15), 3).await.unwrap();
        let second = stage_and_load(&warehouse, &local, date(2025, 1, 15), 3).await.unwrap();

        assert_eq!(first.rows_loaded, 3);
        assert_eq!(first.rows_replaced, 0);
        assert_eq!(second.rows_replaced, 3);
        assert_eq!(warehouse.row_count(TargetTable::Games).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_later_run_date_takes_over_existing_keys() {
        let dir = TempDir::new().unwrap();
        let warehouse = warehouse_in(&dir);
        let local = dir.path().join("games.csv");

        write_games(&local, &games(&["0022400001", "0022400002"]));
        stage_and_load(&warehouse, &local, date(2025, 1, 14), 2).await.unwrap();

        write_games(&local, &games(&["0022400001", "0022400002", "0022400003"]));
        stage_and_load(&warehouse, &local, date(2025, 1, 15), 3).await.unwrap();

        assert_eq!(warehouse.row_count(TargetTable::Games).await.unwrap(), 3);
        let conn = Connection::open(warehouse.database_path()).unwrap();
        let tagged: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM games WHERE run_date = '2025-01-15'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tagged, 3);
    }

    #[tokio::test]
    async fn test_malformed_row_rolls_back_whole_file() {
        let dir = TempDir::new().unwrap();
        let warehouse = warehouse_in(&dir);
        let local = dir.path().join("games.csv");

        write_games(&local, &games(&["0022400001"]));
        stage_and_load(&warehouse, &local, date(2025, 1, 15), 1).await.unwrap();

        // Second load of the same date has a bad third line
        let mut text = String::new();
        text.push_str(&GameRecord::HEADER.join(","));
        text.push('\n');
        text.push_str("0022400005,2025-01-12,MIN vs. NOP,W,1,0,110,0.5,0.8,40,25,10\n");
        text.push_str("0022400006,not-a-date,MIN @ LAL,L,1,1,99,,,38,20,14\n");
        std::fs::write(&local, text).unwrap();

        let err = stage_and_load(&warehouse, &local, date(2025, 1, 15), 2)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadSchema);
        assert!(!err.is_retryable());
        assert!(matches!(err, AppError::LoadSchema { line: 3, .. }));

        // The earlier load for this date is untouched
        let conn = Connection::open(warehouse.database_path()).unwrap();
        let ids: Vec<String> = conn
            .prepare("SELECT game_id FROM games ORDER BY game_id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec!["0022400001".to_string()]);
    }

    #[tokio::test]
    async fn test_header_mismatch_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let warehouse = warehouse_in(&dir);
        let local = dir.path().join("games.csv");
        std::fs::write(&local, "game_id,game_date\n0022400001,2025-01-15\n").unwrap();

        let err = stage_and_load(&warehouse, &local, date(2025, 1, 15), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LoadSchema { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_player_stats_keyed_by_game_and_player() {
        let dir = TempDir::new().unwrap();
        let warehouse = warehouse_in(&dir);
        let local = dir.path().join("player_stats.csv");

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&local)
            .unwrap();
        writer.write_record(PlayerStatRecord::HEADER).unwrap();
        for record in [
            TestDataBuilder::create_player_line("0022400001", 1630162, "Anthony Edwards"),
            TestDataBuilder::create_player_line("0022400001", 1626157, "Karl-Anthony Towns"),
            TestDataBuilder::create_player_line("0022400002", 1630162, "Anthony Edwards"),
        ] {
            writer.serialize(&record).unwrap();
        }
        writer.flush().unwrap();

        let staged = warehouse
            .stage_file(&local, TargetTable::PlayerStats, date(2025, 1, 15), 3)
            .await
            .unwrap();
        let report = warehouse.load_file(&staged).await.unwrap();

        assert_eq!(report.rows_loaded, 3);
        assert_eq!(warehouse.row_count(TargetTable::PlayerStats).await.unwrap(), 3);
        assert_eq!(warehouse.row_count(TargetTable::Games).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_staged_file_lookup() {
        let dir = TempDir::new().unwrap();
        let warehouse = warehouse_in(&dir);

        let missing = warehouse
            .staged_file(TargetTable::Games, date(2025, 1, 15), 0)
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::StagingTransport);

        let local = dir.path().join("games.csv");
        write_games(&local, &games(&["0022400001"]));
        warehouse
            .stage_file(&local, TargetTable::Games, date(2025, 1, 15), 1)
            .await
            .unwrap();
        let found = warehouse
            .staged_file(TargetTable::Games, date(2025, 1, 15), 1)
            .await
            .unwrap();
        assert!(found.location.ends_with("20250115/games.csv"));
    }
}
