use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::app_cache_dir;
use crate::league_baseline::{LeagueSeasonBaseline, compute_league_baseline};
use crate::record::PlayerGameRecord;

const DATE_FMT: &str = "%Y-%m-%d";
const WORST_MIN_MINUTES: u32 = 20;
pub const MAX_LEADERS: usize = 50;

const RECORD_COLUMNS: &str = "game_date, game_id, player_id, player_name, team_abbr, minutes, \
     pts, reb, ast, stl, blk, fg3m, turnovers, fg_pct, ft_pct, fg_attempts, ft_attempts, \
     z_score, season";

/// How a day's batch lands in `player_game_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteMode {
    /// Plain append; re-running a date duplicates its rows.
    #[default]
    Append,
    /// Delete the batch's dates, then append, in one transaction.
    ReplaceDate,
}

impl WriteMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "append" => Some(WriteMode::Append),
            "replace" | "replace_date" | "replace-date" => Some(WriteMode::ReplaceDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderMode {
    Best,
    Worst,
}

impl LeaderMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "best" => Some(LeaderMode::Best),
            "worst" => Some(LeaderMode::Worst),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LeaderMode::Best => "best",
            LeaderMode::Worst => "worst",
        }
    }
}

/// Counters written to `ingest_runs` when a run finishes.
#[derive(Debug, Clone, Default)]
pub struct IngestRunLog {
    pub games_listed: usize,
    pub games_loaded: usize,
    pub games_skipped: usize,
    pub rows_loaded: usize,
    pub errors: Vec<String>,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestRunRow {
    pub run_id: i64,
    pub target_date: String,
    pub games_listed: i64,
    pub games_loaded: i64,
    pub games_skipped: i64,
    pub rows_loaded: i64,
    pub errors: Vec<String>,
    pub outcome: Option<String>,
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("games.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS player_game_stats (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_date TEXT NOT NULL,
            game_id TEXT NOT NULL,
            player_id INTEGER NOT NULL,
            player_name TEXT NOT NULL,
            team_abbr TEXT NOT NULL,
            minutes INTEGER NOT NULL CHECK (minutes > 0),
            pts REAL NOT NULL,
            reb REAL NOT NULL,
            ast REAL NOT NULL,
            stl REAL NOT NULL,
            blk REAL NOT NULL,
            fg3m REAL NOT NULL,
            turnovers REAL NOT NULL,
            fg_pct REAL NULL,
            ft_pct REAL NULL,
            fg_attempts INTEGER NOT NULL,
            ft_attempts INTEGER NOT NULL,
            z_score REAL NOT NULL,
            season TEXT NOT NULL,
            loaded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pgs_date ON player_game_stats(game_date);
        CREATE INDEX IF NOT EXISTS idx_pgs_player_date ON player_game_stats(player_id, game_date);
        CREATE INDEX IF NOT EXISTS idx_pgs_season ON player_game_stats(season);

        CREATE TABLE IF NOT EXISTS league_season_baselines (
            season TEXT PRIMARY KEY,
            means_json TEXT NOT NULL,
            stdevs_json TEXT NOT NULL,
            fg_impact_std REAL NOT NULL,
            ft_impact_std REAL NOT NULL,
            usage_q101_json TEXT NOT NULL,
            sample_players INTEGER NOT NULL,
            sample_games INTEGER NOT NULL,
            computed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            target_date TEXT NOT NULL,
            games_listed INTEGER NOT NULL,
            games_loaded INTEGER NOT NULL,
            games_skipped INTEGER NOT NULL,
            rows_loaded INTEGER NOT NULL,
            errors_json TEXT NOT NULL,
            outcome TEXT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Loads one batch in a single transaction. Returns the number of rows written.
pub fn append_records(
    conn: &mut Connection,
    records: &[PlayerGameRecord],
    mode: WriteMode,
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let loaded_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin load transaction")?;

    if mode == WriteMode::ReplaceDate {
        let dates = records.iter().map(|r| r.game_date).collect::<BTreeSet<_>>();
        for date in dates {
            let removed = tx
                .execute(
                    "DELETE FROM player_game_stats WHERE game_date = ?1",
                    params![fmt_date(date)],
                )
                .context("delete rows for date")?;
            debug!(%date, removed, "replacing date partition");
        }
    }

    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO player_game_stats ({RECORD_COLUMNS}, loaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ))
            .context("prepare insert")?;
        for r in records {
            if r.minutes == 0 {
                return Err(anyhow!(
                    "refusing to persist did-not-play row for player {} in game {}",
                    r.player_id,
                    r.game_id
                ));
            }
            stmt.execute(params![
                fmt_date(r.game_date),
                r.game_id,
                r.player_id,
                r.player_name,
                r.team_abbr,
                r.minutes,
                r.pts,
                r.reb,
                r.ast,
                r.stl,
                r.blk,
                r.fg3m,
                r.turnovers,
                r.fg_pct,
                r.ft_pct,
                r.fg_attempts,
                r.ft_attempts,
                r.z_score,
                r.season,
                loaded_at,
            ])
            .context("insert player game row")?;
        }
    }

    tx.commit().context("commit load transaction")?;
    Ok(records.len())
}

/// A player's games inside `[start, end]`, oldest first.
pub fn load_player_games(
    conn: &Connection,
    player_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PlayerGameRecord>> {
    query_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM player_game_stats
             WHERE player_id = ?1 AND game_date BETWEEN ?2 AND ?3 AND minutes > 0
             ORDER BY game_date ASC, game_id ASC, row_id ASC"
        ),
        params![player_id, fmt_date(start), fmt_date(end)],
    )
    .context("load player games")
}

pub fn load_season_games(conn: &Connection, season: &str) -> Result<Vec<PlayerGameRecord>> {
    query_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM player_game_stats
             WHERE season = ?1 AND minutes > 0
             ORDER BY game_date ASC, game_id ASC, row_id ASC"
        ),
        params![season],
    )
    .context("load season games")
}

pub fn count_rows_for_date(conn: &Connection, date: NaiveDate) -> Result<usize> {
    let n = conn
        .query_row(
            "SELECT COUNT(*) FROM player_game_stats WHERE game_date = ?1",
            params![fmt_date(date)],
            |row| row.get::<_, i64>(0),
        )
        .context("count rows for date")?;
    usize::try_from(n).context("row count out of range")
}

/// Top (`Best`) or bottom (`Worst`, at least 20 minutes) single-game scores
/// for a date.
pub fn daily_leaders(
    conn: &Connection,
    date: NaiveDate,
    limit: usize,
    mode: LeaderMode,
) -> Result<Vec<PlayerGameRecord>> {
    let limit = limit.clamp(1, MAX_LEADERS) as i64;
    let sql = match mode {
        LeaderMode::Best => format!(
            "SELECT {RECORD_COLUMNS} FROM player_game_stats
             WHERE game_date = ?1
             ORDER BY z_score DESC, player_id ASC
             LIMIT ?2"
        ),
        LeaderMode::Worst => format!(
            "SELECT {RECORD_COLUMNS} FROM player_game_stats
             WHERE game_date = ?1 AND minutes >= {WORST_MIN_MINUTES}
             ORDER BY z_score ASC, player_id ASC
             LIMIT ?2"
        ),
    };
    query_records(conn, &sql, params![fmt_date(date), limit]).context("query daily leaders")
}

pub fn player_time_series(
    conn: &Connection,
    player_id: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<PlayerGameRecord>> {
    let start = start.map(fmt_date).unwrap_or_else(|| "0000-01-01".to_string());
    let end = end.map(fmt_date).unwrap_or_else(|| "9999-12-31".to_string());
    query_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM player_game_stats
             WHERE player_id = ?1 AND game_date >= ?2 AND game_date <= ?3
             ORDER BY game_date ASC, game_id ASC, row_id ASC"
        ),
        params![player_id, start, end],
    )
    .context("query player time series")
}

pub fn save_league_baseline(conn: &Connection, b: &LeagueSeasonBaseline) -> Result<()> {
    b.validate()?;
    conn.execute(
        r#"
        INSERT INTO league_season_baselines (
            season, means_json, stdevs_json, fg_impact_std, ft_impact_std,
            usage_q101_json, sample_players, sample_games, computed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(season) DO UPDATE SET
            means_json = excluded.means_json,
            stdevs_json = excluded.stdevs_json,
            fg_impact_std = excluded.fg_impact_std,
            ft_impact_std = excluded.ft_impact_std,
            usage_q101_json = excluded.usage_q101_json,
            sample_players = excluded.sample_players,
            sample_games = excluded.sample_games,
            computed_at = excluded.computed_at
        "#,
        params![
            b.season,
            serde_json::to_string(&b.means).context("serialize means")?,
            serde_json::to_string(&b.stdevs).context("serialize stdevs")?,
            b.fg_impact_std,
            b.ft_impact_std,
            serde_json::to_string(&b.usage_q101).context("serialize usage quantiles")?,
            b.sample_players as i64,
            b.sample_games as i64,
            b.computed_at,
        ],
    )
    .context("upsert league baseline")?;
    Ok(())
}

pub fn load_league_baseline(conn: &Connection, season: &str) -> Result<Option<LeagueSeasonBaseline>> {
    let row = conn
        .query_row(
            "SELECT season, means_json, stdevs_json, fg_impact_std, ft_impact_std,
                    usage_q101_json, sample_players, sample_games, computed_at
             FROM league_season_baselines WHERE season = ?1",
            params![season],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, String>(8)?,
                ))
            },
        )
        .optional()
        .context("query league baseline")?;
    let Some((season, means, stdevs, fg_imp, ft_imp, usage, players, games, computed_at)) = row
    else {
        return Ok(None);
    };
    let sample_players = usize::try_from(players)
        .with_context(|| format!("sample_players out of range for {season}: {players}"))?;
    let sample_games = usize::try_from(games)
        .with_context(|| format!("sample_games out of range for {season}: {games}"))?;
    Ok(Some(LeagueSeasonBaseline {
        season,
        means: serde_json::from_str(&means).context("decode baseline means")?,
        stdevs: serde_json::from_str(&stdevs).context("decode baseline stdevs")?,
        fg_impact_std: fg_imp,
        ft_impact_std: ft_imp,
        usage_q101: serde_json::from_str(&usage).context("decode usage quantiles")?,
        sample_players,
        sample_games,
        computed_at,
    }))
}

/// Recomputes and stores one season's league baseline from stored rows.
pub fn refresh_league_baseline(
    conn: &Connection,
    season: &str,
) -> Result<Option<LeagueSeasonBaseline>> {
    let rows = load_season_games(conn, season)?;
    let computed_at = Utc::now().to_rfc3339();
    let Some(baseline) = compute_league_baseline(season, &rows, &computed_at) else {
        return Ok(None);
    };
    save_league_baseline(conn, &baseline)
        .with_context(|| format!("store league baseline for {season}"))?;
    info!(
        season,
        players = baseline.sample_players,
        games = baseline.sample_games,
        "league baseline refreshed"
    );
    Ok(Some(baseline))
}

pub fn begin_ingest_run(conn: &Connection, target_date: NaiveDate) -> Result<i64> {
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, target_date, games_listed, games_loaded,
                                 games_skipped, rows_loaded, errors_json, outcome)
         VALUES (?1, NULL, ?2, 0, 0, 0, 0, '[]', NULL)",
        params![Utc::now().to_rfc3339(), fmt_date(target_date)],
    )
    .context("insert ingest run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_ingest_run(conn: &Connection, run_id: i64, log: &IngestRunLog) -> Result<()> {
    let errors_json = serde_json::to_string(&log.errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, games_listed = ?2, games_loaded = ?3, games_skipped = ?4,
             rows_loaded = ?5, errors_json = ?6, outcome = ?7
         WHERE run_id = ?8",
        params![
            Utc::now().to_rfc3339(),
            log.games_listed as i64,
            log.games_loaded as i64,
            log.games_skipped as i64,
            log.rows_loaded as i64,
            errors_json,
            log.outcome,
            run_id
        ],
    )
    .context("update ingest run")?;
    Ok(())
}

/// Most recent row of `ingest_runs`.
pub fn latest_ingest_run(conn: &Connection) -> Result<Option<IngestRunRow>> {
    conn.query_row(
        "SELECT run_id, target_date, games_listed, games_loaded, games_skipped, rows_loaded,
                errors_json, outcome
         FROM ingest_runs ORDER BY run_id DESC LIMIT 1",
        [],
        |row| {
            let errors_json: String = row.get(6)?;
            Ok(IngestRunRow {
                run_id: row.get(0)?,
                target_date: row.get(1)?,
                games_listed: row.get(2)?,
                games_loaded: row.get(3)?,
                games_skipped: row.get(4)?,
                rows_loaded: row.get(5)?,
                errors: serde_json::from_str(&errors_json).unwrap_or_default(),
                outcome: row.get(7)?,
            })
        },
    )
    .optional()
    .context("query latest ingest run")
}

fn query_records<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<PlayerGameRecord>> {
    let mut stmt = conn.prepare(sql).context("prepare record query")?;
    let rows = stmt
        .query_map(params, record_from_row)
        .context("run record query")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player game row")?);
    }
    Ok(out)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PlayerGameRecord> {
    let raw_date: String = row.get(0)?;
    let game_date = NaiveDate::parse_from_str(&raw_date, DATE_FMT)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(err)))?;
    Ok(PlayerGameRecord {
        game_date,
        game_id: row.get(1)?,
        player_id: row.get(2)?,
        player_name: row.get(3)?,
        team_abbr: row.get(4)?,
        minutes: row.get(5)?,
        pts: row.get(6)?,
        reb: row.get(7)?,
        ast: row.get(8)?,
        stl: row.get(9)?,
        blk: row.get(10)?,
        fg3m: row.get(11)?,
        turnovers: row.get(12)?,
        fg_pct: row.get(13)?,
        ft_pct: row.get(14)?,
        fg_attempts: row.get(15)?,
        ft_attempts: row.get(16)?,
        z_score: row.get(17)?,
        season: row.get(18)?,
    })
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}
