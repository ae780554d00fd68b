//! Daily ingestion: list a date's games, fetch and normalize each box score,
//! score every row, persist the batch, then refresh league baselines.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::nba_fetch::BoxscoreSource;
use crate::normalize::normalize_boxscore;
use crate::record::PlayerGameRecord;
use crate::retry::{FetchOutcome, fetch_with_retry};
use crate::season::season_label;
use crate::store::{self, IngestRunLog};
use crate::zscore::score_records;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The box score came back with no rows.
    Empty,
    /// Every row was a did-not-play.
    NoPlayers,
    /// Every attempt timed out.
    TimedOut { attempts: u32 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedGame {
    pub game_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub date: NaiveDate,
    pub profile_version: String,
    pub games_listed: usize,
    pub games_loaded: usize,
    pub skipped: Vec<SkippedGame>,
    pub rows_loaded: usize,
    pub seasons_refreshed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Nothing scheduled; no store write happened.
    NoGames { date: NaiveDate },
    /// Games were listed but none produced a row; no store write happened.
    NoRows {
        date: NaiveDate,
        games_listed: usize,
        skipped: Vec<SkippedGame>,
    },
    Loaded(IngestSummary),
}

impl IngestOutcome {
    pub fn rows_loaded(&self) -> usize {
        match self {
            IngestOutcome::Loaded(summary) => summary.rows_loaded,
            _ => 0,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            IngestOutcome::NoGames { .. } => "no_games",
            IngestOutcome::NoRows { .. } => "no_rows",
            IngestOutcome::Loaded(_) => "loaded",
        }
    }
}

/// Yesterday on the local clock.
pub fn default_target_date() -> NaiveDate {
    let today = Local::now().date_naive();
    today.pred_opt().unwrap_or(today)
}

pub fn run_daily_ingest<S>(
    source: &S,
    conn: &mut Connection,
    cfg: &PipelineConfig,
    date: NaiveDate,
) -> PipelineResult<IngestOutcome>
where
    S: BoxscoreSource + ?Sized,
{
    run_daily_ingest_using(source, conn, cfg, date, std::thread::sleep)
}

/// [`run_daily_ingest`] with an injectable sleeper for pacing and backoff.
pub fn run_daily_ingest_using<S, F>(
    source: &S,
    conn: &mut Connection,
    cfg: &PipelineConfig,
    date: NaiveDate,
    mut sleep: F,
) -> PipelineResult<IngestOutcome>
where
    S: BoxscoreSource + ?Sized,
    F: FnMut(Duration),
{
    let season = season_label(date);
    let mut log = IngestRunLog::default();

    let game_ids = match source.list_game_ids(date, &season) {
        Ok(ids) => ids,
        Err(err) => {
            log.errors.push(err.to_string());
            let run_id = open_run(conn, date);
            close_run(conn, run_id, &mut log, "list_failed");
            return Err(PipelineError::Upstream(err));
        }
    };
    if game_ids.is_empty() {
        info!(%date, "no games scheduled");
        return Ok(IngestOutcome::NoGames { date });
    }
    log.games_listed = game_ids.len();
    let run_id = open_run(conn, date);
    info!(%date, season = %season, games = game_ids.len(), "ingesting games");

    let mut records: Vec<PlayerGameRecord> = Vec::new();
    let mut skipped = Vec::new();
    let mut games_loaded = 0usize;
    for (idx, game_id) in game_ids.iter().enumerate() {
        if idx > 0 && !cfg.pacing.is_zero() {
            sleep(cfg.pacing);
        }
        let reason = match fetch_with_retry(source, game_id, &cfg.retry, &mut sleep) {
            FetchOutcome::Table(table) if table.is_empty() => SkipReason::Empty,
            FetchOutcome::Table(table) => {
                let rows = normalize_boxscore(&table, date, game_id);
                if rows.is_empty() {
                    SkipReason::NoPlayers
                } else {
                    debug!(game_id = game_id.as_str(), rows = rows.len(), "box score normalized");
                    games_loaded += 1;
                    records.extend(rows);
                    continue;
                }
            }
            FetchOutcome::Exhausted { attempts, .. } => SkipReason::TimedOut { attempts },
            FetchOutcome::Failed { error, .. } => SkipReason::Failed {
                error: error.to_string(),
            },
        };
        warn!(game_id = game_id.as_str(), reason = ?reason, "skipping game");
        if let SkipReason::Failed { error } = &reason {
            log.errors.push(format!("{game_id}: {error}"));
        }
        skipped.push(SkippedGame {
            game_id: game_id.clone(),
            reason,
        });
    }
    log.games_loaded = games_loaded;
    log.games_skipped = skipped.len();

    if records.is_empty() {
        let outcome = IngestOutcome::NoRows {
            date,
            games_listed: game_ids.len(),
            skipped,
        };
        close_run(conn, run_id, &mut log, outcome.label());
        return Ok(outcome);
    }

    score_records(&mut records, &cfg.profile);
    let rows_loaded = match store::append_records(conn, &records, cfg.write_mode) {
        Ok(n) => n,
        Err(err) => {
            log.errors.push(format!("{err:#}"));
            close_run(conn, run_id, &mut log, "store_failed");
            return Err(PipelineError::Store(err));
        }
    };
    log.rows_loaded = rows_loaded;
    info!(%date, rows = rows_loaded, mode = ?cfg.write_mode, "rows persisted");

    let seasons = records
        .iter()
        .map(|r| r.season.clone())
        .collect::<BTreeSet<_>>();
    let mut seasons_refreshed = Vec::new();
    for season in seasons {
        if let Err(cause) = store::refresh_league_baseline(conn, &season) {
            log.errors.push(format!("refresh {season}: {cause:#}"));
            close_run(conn, run_id, &mut log, "refresh_failed");
            return Err(PipelineError::BaselineRefresh { rows_loaded, cause });
        }
        seasons_refreshed.push(season);
    }

    let outcome = IngestOutcome::Loaded(IngestSummary {
        date,
        profile_version: cfg.profile.version.clone(),
        games_listed: game_ids.len(),
        games_loaded,
        skipped,
        rows_loaded,
        seasons_refreshed,
    });
    close_run(conn, run_id, &mut log, outcome.label());
    Ok(outcome)
}

/// The audit row is best effort: a failed insert leaves the run unlogged
/// rather than failing it.
fn open_run(conn: &Connection, date: NaiveDate) -> Option<i64> {
    match store::begin_ingest_run(conn, date) {
        Ok(run_id) => Some(run_id),
        Err(err) => {
            warn!(%date, error = %format!("{err:#}"), "ingest run log not opened");
            None
        }
    }
}

/// Records how the run ended. The caller's outcome stands either way.
fn close_run(conn: &Connection, run_id: Option<i64>, log: &mut IngestRunLog, outcome: &str) {
    let Some(run_id) = run_id else {
        return;
    };
    log.outcome = outcome.to_string();
    if let Err(err) = store::finish_ingest_run(conn, run_id, log) {
        warn!(run_id, error = %format!("{err:#}"), "ingest run log not updated");
    }
}
