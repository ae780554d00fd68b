//! Per-player season baseline and trailing-window form.
//!
//! A baseline compares a player's per-game averages (season to date, and the
//! last `window` games) against the league distribution for the season.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::StatAggregate;
use crate::error::{PipelineError, PipelineResult};
use crate::league_baseline::LeagueSeasonBaseline;
use crate::record::PlayerGameRecord;
use crate::season::SeasonCalendar;
use crate::store;
use crate::zscore::{Category, round_composite};

pub const MIN_WINDOW: usize = 3;
pub const MAX_WINDOW: usize = 10;
pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBaseline {
    pub category: Category,
    pub label: String,
    pub avg_season: Option<f64>,
    pub avg_window: Option<f64>,
    /// Signed so that higher is always better (turnovers already negated).
    pub z_season: f64,
    pub z_window: f64,
    pub z_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBaseline {
    pub player_id: i64,
    pub player_name: String,
    pub team_abbr: String,
    pub season: String,
    pub window: usize,
    pub games_season: usize,
    pub games_window: usize,
    pub season_avg: StatAggregate,
    pub window_avg: StatAggregate,
    pub usage_percentile_season: Option<u8>,
    pub usage_percentile_window: Option<u8>,
    pub categories: Vec<CategoryBaseline>,
    pub z_total_season: f64,
    pub z_total_window: f64,
    /// Rounded window total minus rounded season total.
    pub z_total_delta: f64,
}

impl PlayerBaseline {
    pub fn category(&self, cat: Category) -> Option<&CategoryBaseline> {
        self.categories.iter().find(|c| c.category == cat)
    }
}

pub fn validate_window(window: usize) -> PipelineResult<usize> {
    if (MIN_WINDOW..=MAX_WINDOW).contains(&window) {
        Ok(window)
    } else {
        Err(PipelineError::invalid(format!(
            "window must be between {MIN_WINDOW} and {MAX_WINDOW}, got {window}"
        )))
    }
}

pub fn validate_player_id(player_id: i64) -> PipelineResult<i64> {
    if player_id > 0 {
        Ok(player_id)
    } else {
        Err(PipelineError::invalid(format!(
            "player id must be positive, got {player_id}"
        )))
    }
}

/// z of one category average against the league: counting stats use the plain
/// deviation, percentages are weighted by attempt volume and use the impact
/// deviation. Missing averages and degenerate deviations give 0.
pub fn aggregate_z(agg: &StatAggregate, league: &LeagueSeasonBaseline, cat: Category) -> f64 {
    let Some(avg) = agg.category_avg(cat) else {
        return 0.0;
    };
    let stdev = league.stdev_for(cat);
    if stdev == 0.0 || !stdev.is_finite() {
        return 0.0;
    }
    let z = (avg - league.means[cat.index()]) * agg.attempt_volume(cat) / stdev * cat.sign();
    if z.is_finite() { z } else { 0.0 }
}

/// Builds a baseline from a player's stored games. Returns `Ok(None)` when the
/// player has no game with minutes in `rows`; a window outside
/// `MIN_WINDOW..=MAX_WINDOW` is `InvalidInput`.
///
/// The trailing window is the `window` most recent games ordered by date,
/// then game id, both descending. Input order does not matter.
pub fn compose_baseline(
    player_id: i64,
    season: &str,
    rows: &[PlayerGameRecord],
    league: &LeagueSeasonBaseline,
    window: usize,
) -> PipelineResult<Option<PlayerBaseline>> {
    let window = validate_window(window)?;
    let mut games = rows
        .iter()
        .filter(|r| r.player_id == player_id && r.minutes > 0)
        .collect::<Vec<_>>();
    if games.is_empty() {
        return Ok(None);
    }
    games.sort_by(|a, b| {
        b.game_date
            .cmp(&a.game_date)
            .then_with(|| b.game_id.cmp(&a.game_id))
    });
    let latest = games[0];

    let (Some(season_avg), Some(window_avg)) = (
        StatAggregate::from_records(games.iter().copied()),
        StatAggregate::from_records(games.iter().take(window).copied()),
    ) else {
        return Ok(None);
    };

    let categories = Category::ALL
        .iter()
        .map(|&cat| {
            let z_season = aggregate_z(&season_avg, league, cat);
            let z_window = aggregate_z(&window_avg, league, cat);
            CategoryBaseline {
                category: cat,
                label: cat.label().to_string(),
                avg_season: season_avg.category_avg(cat),
                avg_window: window_avg.category_avg(cat),
                z_season,
                z_window,
                z_delta: z_window - z_season,
            }
        })
        .collect::<Vec<_>>();

    let z_total_season = round_composite(categories.iter().map(|c| c.z_season).sum());
    let z_total_window = round_composite(categories.iter().map(|c| c.z_window).sum());

    Ok(Some(PlayerBaseline {
        player_id,
        player_name: latest.player_name.clone(),
        team_abbr: latest.team_abbr.clone(),
        season: season.to_string(),
        window,
        games_season: season_avg.games,
        games_window: window_avg.games,
        usage_percentile_season: league.usage_percentile(season_avg.usage_per_min),
        usage_percentile_window: league.usage_percentile(window_avg.usage_per_min),
        season_avg,
        window_avg,
        categories,
        z_total_season,
        z_total_window,
        z_total_delta: z_total_window - z_total_season,
    }))
}

/// Store-backed baseline lookup.
///
/// `Ok(None)` means the player has no qualifying games in the season. A bad
/// id, window or season, or a season without a stored league baseline, is
/// `InvalidInput`.
pub fn load_player_baseline(
    conn: &Connection,
    calendar: &SeasonCalendar,
    player_id: i64,
    season: &str,
    window: usize,
) -> PipelineResult<Option<PlayerBaseline>> {
    let player_id = validate_player_id(player_id)?;
    let window = validate_window(window)?;
    let (start, end) = calendar.span(season)?;
    let label = calendar.resolve(season)?.label();

    let league = store::load_league_baseline(conn, &label)
        .map_err(PipelineError::Store)?
        .ok_or_else(|| {
            PipelineError::invalid(format!("no league baseline stored for season {label}"))
        })?;
    league
        .validate()
        .map_err(|err| PipelineError::invalid(format!("{err:#}")))?;

    let rows = store::load_player_games(conn, player_id, start, end).map_err(PipelineError::Store)?;
    debug!(player_id, season = %label, rows = rows.len(), "composing baseline");
    compose_baseline(player_id, &label, &rows, &league, window)
}
