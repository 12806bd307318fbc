use chrono::NaiveDate;
use nba_pipeline::config::{Config, ExtractScope, PipelineSettings, RetrySettings, WarehouseSettings};
use nba_pipeline::data_fetcher::StatsApi;
use nba_pipeline::error::{AppError, ErrorKind};
use nba_pipeline::pipeline::{Pipeline, RunLock, RunManifest, RunPartition, Step};
use nba_pipeline::testing_utils::fixtures;
use nba_pipeline::warehouse::{SqliteWarehouse, TargetTable, Warehouse};
use rusqlite::Connection;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

fn test_config(server: &MockServer, dir: &TempDir) -> Config {
    Config {
        api_base_url: server.uri(),
        data_dir: dir.path().join("raw").display().to_string(),
        http_timeout_seconds: 5,
        request_interval_ms: 0,
        retry: RetrySettings {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 50,
            exponential: true,
        },
        pipeline: PipelineSettings {
            step_retries: 0,
            step_retry_delay_seconds: 0,
            trigger_time: "11:00".to_string(),
            lock_stale_after_seconds: 3600,
        },
        warehouse: WarehouseSettings {
            database_path: dir.path().join("warehouse.db").display().to_string(),
            stage_dir: dir.path().join("stage").display().to_string(),
        },
        ..Config::default()
    }
}

fn pipeline_for(config: Config) -> Pipeline<SqliteWarehouse> {
    let api = StatsApi::new(&config).unwrap();
    let warehouse = SqliteWarehouse::from_settings(&config.warehouse).unwrap();
    Pipeline::new(config, api, warehouse)
}

/// Two played games around the 15th, one scheduled game after it.
async fn mount_season(server: &MockServer) {
    let mut scheduled = fixtures::game_row("0022400590", "JAN 17, 2025", "MIN @ DEN", "", 0);
    scheduled[4] = serde_json::Value::Null;

    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .and(query_param("TeamID", "1610612750"))
        .and(query_param("Season", "2024-25"))
        .and(query_param("SeasonType", "Regular Season"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::team_game_log(&[
            fixtures::game_row("0022400571", "JAN 15, 2025", "MIN vs. NOP", "W", 119),
            fixtures::game_row("0022400550", "JAN 12, 2025", "MIN @ SAC", "L", 104),
            scheduled,
        ])))
        .mount(server)
        .await;

    mount_box_score(
        server,
        "0022400550",
        vec![
            fixtures::player_row("0022400550", 1630162, "Anthony Edwards", Some("38:02"), 30),
            fixtures::player_row("0022400550", 1626157, "Karl-Anthony Towns", Some("34:10"), 22),
        ],
    )
    .await;
    mount_box_score(
        server,
        "0022400571",
        vec![
            fixtures::player_row("0022400571", 1630162, "Anthony Edwards", Some("36:12"), 31),
            fixtures::player_row("0022400571", 203944, "Julius Randle", Some("33:45"), 18),
            fixtures::player_row("0022400571", 1629675, "Naz Reid", Some("24:01"), 12),
            fixtures::player_row("0022400571", 1641732, "Rob Dillingham", None, 0),
        ],
    )
    .await;
}

async fn mount_box_score(server: &MockServer, game_id: &str, rows: Vec<Vec<serde_json::Value>>) {
    Mock::given(method("GET"))
        .and(path("/boxscoretraditionalv2"))
        .and(query_param("GameID", game_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::box_score(game_id, &rows)))
        .mount(server)
        .await;
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[tokio::test]
async fn test_full_run_loads_games_to_date() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(test_config(&server, &dir));

    let summary = pipeline.run(jan(15), Step::Extract).await.unwrap();

    assert_eq!(summary.manifest.rows(TargetTable::Games), 2);
    assert_eq!(summary.manifest.rows(TargetTable::PlayerStats), 5);
    assert_eq!(summary.loads.len(), 2);
    assert_eq!(summary.rows_loaded(), 7);

    let warehouse = pipeline.warehouse();
    assert_eq!(warehouse.row_count(TargetTable::Games).await.unwrap(), 2);
    assert_eq!(warehouse.row_count(TargetTable::PlayerStats).await.unwrap(), 5);

    let partition = RunPartition::new(&pipeline.config().data_dir, jan(15));
    assert!(partition.file_path(TargetTable::Games).exists());
    assert!(partition.manifest_path().exists());
    assert!(!partition.lock_path().exists(), "lock is released after the run");
}

#[tokio::test]
async fn test_rerun_same_date_keeps_row_counts() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(test_config(&server, &dir));

    pipeline.run(jan(15), Step::Extract).await.unwrap();
    let games_once = pipeline.warehouse().row_count(TargetTable::Games).await.unwrap();
    let players_once = pipeline
        .warehouse()
        .row_count(TargetTable::PlayerStats)
        .await
        .unwrap();

    let second = pipeline.run(jan(15), Step::Extract).await.unwrap();

    assert_eq!(pipeline.warehouse().row_count(TargetTable::Games).await.unwrap(), games_once);
    assert_eq!(
        pipeline
            .warehouse()
            .row_count(TargetTable::PlayerStats)
            .await
            .unwrap(),
        players_once
    );
    assert!(second.loads.iter().all(|r| r.rows_replaced == r.rows_loaded));
}

#[tokio::test]
async fn test_consecutive_days_do_not_duplicate_games() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(test_config(&server, &dir));

    pipeline.run(jan(15), Step::Extract).await.unwrap();
    pipeline.run(jan(16), Step::Extract).await.unwrap();

    let conn = Connection::open(pipeline.warehouse().database_path()).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM games"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(DISTINCT game_id) FROM games"), 2);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM games WHERE run_date = '2025-01-16'"),
        2
    );
}

#[tokio::test]
async fn test_day_scope_single_game_example() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        scope: ExtractScope::Day,
        ..test_config(&server, &dir)
    };
    let pipeline = pipeline_for(config);

    let summary = pipeline.run(jan(15), Step::Extract).await.unwrap();
    assert_eq!(summary.manifest.scope, ExtractScope::Day);

    let conn = Connection::open(pipeline.warehouse().database_path()).unwrap();
    let (game_date, result): (String, String) = conn
        .query_row("SELECT game_date, result FROM games", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(game_date, "2025-01-15");
    assert!(result == "W" || result == "L");

    // One row per player who logged minutes; the DNP is left out
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM player_stats"), 3);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM player_stats WHERE game_id <> '0022400571'"),
        0
    );
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM player_stats WHERE player_id = 1641732"),
        0
    );
}

#[tokio::test]
async fn test_game_without_box_score_does_not_abort() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::team_game_log(&[
            fixtures::game_row("0022400571", "JAN 15, 2025", "MIN vs. NOP", "W", 119),
        ])))
        .mount(&server)
        .await;
    mount_box_score(&server, "0022400571", vec![]).await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(test_config(&server, &dir));

    let summary = pipeline.run(jan(15), Step::Extract).await.unwrap();

    assert_eq!(summary.manifest.rows(TargetTable::Games), 1);
    assert_eq!(summary.manifest.rows(TargetTable::PlayerStats), 0);
    assert_eq!(pipeline.warehouse().row_count(TargetTable::Games).await.unwrap(), 1);
    assert_eq!(pipeline.warehouse().row_count(TargetTable::PlayerStats).await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_season_rejected_unless_off_season() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::team_game_log(&[])))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let in_season = pipeline_for(Config {
        pipeline: PipelineSettings {
            step_retries: 1,
            step_retry_delay_seconds: 3600,
            trigger_time: "11:00".to_string(),
            lock_stale_after_seconds: 3600,
        },
        ..test_config(&server, &dir)
    });
    // Not retried: a retry would sleep for an hour
    let err = in_season.run(jan(15), Step::Extract).await.unwrap_err();
    match &err {
        AppError::StepFailed { step, kind, .. } => {
            assert_eq!(step, "validate");
            assert_eq!(*kind, ErrorKind::ExtractionIncomplete);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(in_season.warehouse().row_count(TargetTable::Games).await.unwrap(), 0);

    let off_season = pipeline_for(Config {
        off_season: true,
        ..test_config(&server, &dir)
    });
    let summary = off_season.run(jan(15), Step::Extract).await.unwrap();
    assert_eq!(summary.rows_loaded(), 0);
}

#[tokio::test]
async fn test_two_timeouts_then_success_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::team_game_log(&[]))
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::team_game_log(&[
            fixtures::game_row("0022400571", "JAN 15, 2025", "MIN vs. NOP", "W", 119),
        ])))
        .with_priority(2)
        .mount(&server)
        .await;
    mount_box_score(
        &server,
        "0022400571",
        vec![fixtures::player_row("0022400571", 1630162, "Anthony Edwards", Some("36:12"), 31)],
    )
    .await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(Config {
        http_timeout_seconds: 1,
        ..test_config(&server, &dir)
    });

    let summary = pipeline.run(jan(15), Step::Extract).await.unwrap();

    assert_eq!(summary.manifest.rows(TargetTable::Games), 1);
    assert_eq!(summary.manifest.rows(TargetTable::PlayerStats), 1);
}

#[tokio::test]
async fn test_timeouts_beyond_budget_fail_without_output() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::team_game_log(&[]))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(3)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(Config {
        http_timeout_seconds: 1,
        ..test_config(&server, &dir)
    });

    let err = pipeline.run(jan(15), Step::Extract).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    assert!(matches!(err, AppError::StepFailed { ref step, .. } if step == "extract"));
    let partition = RunPartition::new(&pipeline.config().data_dir, jan(15));
    assert!(!partition.file_path(TargetTable::Games).exists());
    assert!(!partition.manifest_path().exists());
}

#[tokio::test]
async fn test_step_retried_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::team_game_log(&[
            fixtures::game_row("0022400571", "JAN 15, 2025", "MIN vs. NOP", "W", 119),
        ])))
        .with_priority(2)
        .mount(&server)
        .await;
    mount_box_score(&server, "0022400571", vec![]).await;
    let dir = TempDir::new().unwrap();
    let base = test_config(&server, &dir);
    let pipeline = pipeline_for(Config {
        retry: RetrySettings {
            max_attempts: 1,
            ..base.retry.clone()
        },
        pipeline: PipelineSettings {
            step_retries: 1,
            ..base.pipeline.clone()
        },
        ..base
    });

    let summary = pipeline.run(jan(15), Step::Extract).await.unwrap();
    assert_eq!(summary.manifest.rows(TargetTable::Games), 1);
}

#[tokio::test]
async fn test_resume_from_validate_skips_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teamgamelog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::team_game_log(&[
            fixtures::game_row("0022400571", "JAN 15, 2025", "MIN vs. NOP", "W", 119),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    mount_box_score(
        &server,
        "0022400571",
        vec![fixtures::player_row("0022400571", 1630162, "Anthony Edwards", Some("36:12"), 31)],
    )
    .await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(test_config(&server, &dir));

    let first = pipeline.run(jan(15), Step::Extract).await.unwrap();
    let resumed = pipeline.run(jan(15), Step::Validate).await.unwrap();

    assert_eq!(resumed.manifest.files, first.manifest.files);
    assert_eq!(pipeline.warehouse().row_count(TargetTable::Games).await.unwrap(), 1);

    let from_load = pipeline.run(jan(15), Step::Load).await.unwrap();
    assert_eq!(from_load.rows_loaded(), 2);
    assert_eq!(pipeline.warehouse().row_count(TargetTable::PlayerStats).await.unwrap(), 1);
}

#[tokio::test]
async fn test_resume_without_extraction_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(test_config(&server, &dir));

    let err = pipeline.run(jan(15), Step::Validate).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtractionIncomplete);
    let partition = RunPartition::new(&pipeline.config().data_dir, jan(15));
    assert!(RunManifest::read(&partition).await.is_err());
}

#[tokio::test]
async fn test_same_date_run_is_rejected_while_locked() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(test_config(&server, &dir));

    let partition = RunPartition::new(&pipeline.config().data_dir, jan(15));
    partition.ensure_dir().await.unwrap();
    let held = RunLock::acquire(&partition, Duration::from_secs(3600)).unwrap();

    let err = pipeline.run(jan(15), Step::Extract).await.unwrap_err();
    assert!(matches!(err, AppError::RunAlreadyActive { .. }));

    // A different date is unaffected
    pipeline.run(jan(16), Step::Extract).await.unwrap();

    drop(held);
    pipeline.run(jan(15), Step::Extract).await.unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_rerun_after_crash_replaces_stale_lock() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_for(test_config(&server, &dir));

    pipeline.run(jan(15), Step::Extract).await.unwrap();

    // A run that was killed mid-way leaves its lock behind
    let partition = RunPartition::new(&pipeline.config().data_dir, jan(15));
    std::fs::write(
        partition.lock_path(),
        format!("pid={} started={}\n", u32::MAX, chrono::Utc::now().to_rfc3339()),
    )
    .unwrap();

    let resumed = pipeline.run(jan(15), Step::Stage).await.unwrap();
    assert_eq!(resumed.rows_loaded(), 7);
    assert!(!partition.lock_path().exists());
    assert_eq!(pipeline.warehouse().row_count(TargetTable::Games).await.unwrap(), 2);
}

#[tokio::test]
async fn test_resume_from_load_without_staged_files_fails_at_once() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    let dir = TempDir::new().unwrap();
    let base = test_config(&server, &dir);
    pipeline_for(base.clone())
        .run(jan(15), Step::Extract)
        .await
        .unwrap();

    let other_stage = TempDir::new().unwrap();
    let pipeline = pipeline_for(Config {
        pipeline: PipelineSettings {
            step_retries: 1,
            step_retry_delay_seconds: 3600,
            ..base.pipeline.clone()
        },
        warehouse: WarehouseSettings {
            database_path: other_stage.path().join("warehouse.db").display().to_string(),
            stage_dir: other_stage.path().join("stage").display().to_string(),
        },
        ..base
    });

    let err = tokio::time::timeout(Duration::from_secs(10), pipeline.run(jan(15), Step::Load))
        .await
        .expect("missing staged files are not retried")
        .unwrap_err();
    assert!(matches!(err, AppError::StepFailed { .. }));
    assert_eq!(err.kind(), ErrorKind::StagingTransport);
}
