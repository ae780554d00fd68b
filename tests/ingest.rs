use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::Connection;

use hoops_zscore::config::PipelineConfig;
use hoops_zscore::error::PipelineError;
use hoops_zscore::fake_source::{ScriptedSource, SeedLine};
use hoops_zscore::ingest::{IngestOutcome, SkipReason, run_daily_ingest_using};
use hoops_zscore::raw_table::RawTable;
use hoops_zscore::store::{self, WriteMode};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
}

fn config() -> PipelineConfig {
    let mut cfg = PipelineConfig::from_lookup(|_| None).expect("defaults are valid");
    cfg.pacing = Duration::ZERO;
    cfg
}

fn seed(player_id: i64, name: &'static str, minutes: Option<&'static str>, pts: u32) -> SeedLine {
    SeedLine {
        team: "BOS",
        player_id,
        name,
        minutes,
        fgm: pts / 2,
        fga: pts,
        fg3m: 1,
        ftm: 2,
        fta: 3,
        reb: 5,
        ast: 4,
        stl: 1,
        blk: 0,
        tov: 2,
        pts,
    }
}

fn two_game_source() -> ScriptedSource {
    ScriptedSource::new()
        .with_games(date(), &["g1", "g2"])
        .with_boxscore(
            "g1",
            &[seed(1, "Alpha", Some("30:00"), 20), seed(2, "Bravo", None, 0)],
        )
        .with_boxscore(
            "g2",
            &[seed(3, "Charlie", Some("25:30"), 12), seed(4, "Delta", Some("12:00"), 4)],
        )
}

fn ingest(source: &ScriptedSource, conn: &mut Connection, cfg: &PipelineConfig) -> IngestOutcome {
    run_daily_ingest_using(source, conn, cfg, date(), |_| {}).expect("ingest should succeed")
}

#[test]
fn empty_listing_is_no_games_without_writes() {
    let mut conn = store::open_in_memory().unwrap();
    let source = ScriptedSource::new();
    let outcome = ingest(&source, &mut conn, &config());
    assert_eq!(outcome, IngestOutcome::NoGames { date: date() });
    assert_eq!(outcome.rows_loaded(), 0);
    assert_eq!(store::count_rows_for_date(&conn, date()).unwrap(), 0);
    assert!(store::load_league_baseline(&conn, "2024-25").unwrap().is_none());

    assert!(store::latest_ingest_run(&conn).unwrap().is_none());
}

#[test]
fn empty_listing_succeeds_without_an_audit_table() {
    let mut conn = store::open_in_memory().unwrap();
    conn.execute_batch("DROP TABLE ingest_runs").unwrap();
    let outcome = ingest(&ScriptedSource::new(), &mut conn, &config());
    assert_eq!(outcome, IngestOutcome::NoGames { date: date() });
}

#[test]
fn audit_log_failure_does_not_fail_a_load() {
    let mut conn = store::open_in_memory().unwrap();
    conn.execute_batch("DROP TABLE ingest_runs").unwrap();
    let outcome = ingest(&two_game_source(), &mut conn, &config());
    assert!(matches!(outcome, IngestOutcome::Loaded(_)));
    assert_eq!(outcome.rows_loaded(), 3);
    assert_eq!(store::count_rows_for_date(&conn, date()).unwrap(), 3);
    assert!(store::load_league_baseline(&conn, "2024-25").unwrap().is_some());
}

#[test]
fn loads_scores_and_refreshes_baseline() {
    let mut conn = store::open_in_memory().unwrap();
    let outcome = ingest(&two_game_source(), &mut conn, &config());
    let IngestOutcome::Loaded(summary) = outcome else {
        panic!("expected a load, got {outcome:?}");
    };
    assert_eq!(summary.games_listed, 2);
    assert_eq!(summary.games_loaded, 2);
    assert_eq!(summary.rows_loaded, 3);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.seasons_refreshed, vec!["2024-25".to_string()]);
    assert_eq!(summary.profile_version, "ingest-2024-25");

    let leaders = store::daily_leaders(&conn, date(), 10, store::LeaderMode::Best).unwrap();
    assert_eq!(leaders.len(), 3);
    assert_eq!(leaders[0].player_name, "Alpha");
    assert!(leaders.iter().all(|r| r.z_score.is_finite() && r.minutes > 0));

    let league = store::load_league_baseline(&conn, "2024-25").unwrap().unwrap();
    assert_eq!(league.sample_players, 3);
    assert_eq!(league.usage_q101.len(), 101);

    let run = store::latest_ingest_run(&conn).unwrap().unwrap();
    assert_eq!(run.outcome.as_deref(), Some("loaded"));
    assert_eq!(run.rows_loaded, 3);
}

#[test]
fn timed_out_game_does_not_block_the_rest() {
    let mut conn = store::open_in_memory().unwrap();
    let mut cfg = config();
    cfg.pacing = Duration::from_millis(400);
    let source = ScriptedSource::new()
        .with_games(date(), &["g1", "g2"])
        .with_timeouts("g1", 3)
        .with_boxscore("g1", &[seed(9, "Never", Some("30:00"), 30)])
        .with_boxscore("g2", &[seed(3, "Charlie", Some("25:30"), 12)]);

    let mut sleeps = Vec::new();
    let outcome =
        run_daily_ingest_using(&source, &mut conn, &cfg, date(), |d| sleeps.push(d)).unwrap();

    assert_eq!(source.calls("g1"), 3);
    assert_eq!(source.calls("g2"), 1);
    assert_eq!(
        sleeps,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_millis(400)
        ]
    );
    let IngestOutcome::Loaded(summary) = outcome else {
        panic!("expected a load");
    };
    assert_eq!(summary.rows_loaded, 1);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].game_id, "g1");
    assert_eq!(summary.skipped[0].reason, SkipReason::TimedOut { attempts: 3 });
}

#[test]
fn all_empty_games_is_no_rows_without_writes() {
    let mut conn = store::open_in_memory().unwrap();
    let source = ScriptedSource::new()
        .with_games(date(), &["g1", "g2"])
        .with_reply("g1", Ok(RawTable::default()))
        .with_boxscore("g2", &[seed(2, "Bravo", None, 0)]);
    let outcome = ingest(&source, &mut conn, &config());
    match outcome {
        IngestOutcome::NoRows {
            games_listed,
            skipped,
            ..
        } => {
            assert_eq!(games_listed, 2);
            assert_eq!(skipped[0].reason, SkipReason::Empty);
            assert_eq!(skipped[1].reason, SkipReason::NoPlayers);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(store::count_rows_for_date(&conn, date()).unwrap(), 0);
    assert!(store::load_league_baseline(&conn, "2024-25").unwrap().is_none());
}

#[test]
fn append_duplicates_and_replace_date_is_idempotent() {
    let mut conn = store::open_in_memory().unwrap();
    let mut cfg = config();
    ingest(&two_game_source(), &mut conn, &cfg);
    ingest(&two_game_source(), &mut conn, &cfg);
    assert_eq!(store::count_rows_for_date(&conn, date()).unwrap(), 6);

    cfg.write_mode = WriteMode::ReplaceDate;
    ingest(&two_game_source(), &mut conn, &cfg);
    ingest(&two_game_source(), &mut conn, &cfg);
    assert_eq!(store::count_rows_for_date(&conn, date()).unwrap(), 3);
}

#[test]
fn listing_failure_is_upstream_error() {
    let mut conn = store::open_in_memory().unwrap();
    let source = ScriptedSource::new().with_listing_error("http 503");
    let err = run_daily_ingest_using(&source, &mut conn, &config(), date(), |_| {}).unwrap_err();
    assert!(matches!(err, PipelineError::Upstream(_)));
    let run = store::latest_ingest_run(&conn).unwrap().unwrap();
    assert_eq!(run.outcome.as_deref(), Some("list_failed"));
    assert_eq!(run.errors.len(), 1);
}

#[test]
fn store_failure_is_fatal() {
    let mut conn = store::open_in_memory().unwrap();
    conn.execute_batch("DROP TABLE player_game_stats").unwrap();
    let err = run_daily_ingest_using(&two_game_source(), &mut conn, &config(), date(), |_| {})
        .unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)));
}

#[test]
fn refresh_failure_keeps_persisted_rows() {
    let mut conn = store::open_in_memory().unwrap();
    conn.execute_batch("DROP TABLE league_season_baselines").unwrap();
    let err = run_daily_ingest_using(&two_game_source(), &mut conn, &config(), date(), |_| {})
        .unwrap_err();
    match err {
        PipelineError::BaselineRefresh { rows_loaded, .. } => assert_eq!(rows_loaded, 3),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(store::count_rows_for_date(&conn, date()).unwrap(), 3);
    let run = store::latest_ingest_run(&conn).unwrap().unwrap();
    assert_eq!(run.outcome.as_deref(), Some("refresh_failed"));
}
