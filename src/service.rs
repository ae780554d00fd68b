use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::baseline::{PlayerBaseline, load_player_baseline, validate_player_id};
use crate::cache::Cache;
use crate::error::{PipelineError, PipelineResult};
use crate::record::PlayerGameRecord;
use crate::season::SeasonCalendar;
use crate::store::{self, LeaderMode, MAX_LEADERS};

/// Read side over the record store, fronted by a cache.
pub struct StatsService<C> {
    conn: Connection,
    calendar: SeasonCalendar,
    cache: C,
}

impl<C: Cache> StatsService<C> {
    pub fn new(conn: Connection, calendar: SeasonCalendar, cache: C) -> Self {
        Self {
            conn,
            calendar,
            cache,
        }
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn daily_leaders(
        &self,
        date: NaiveDate,
        limit: usize,
        mode: LeaderMode,
    ) -> PipelineResult<Vec<PlayerGameRecord>> {
        if !(1..=MAX_LEADERS).contains(&limit) {
            return Err(PipelineError::invalid(format!(
                "limit must be between 1 and {MAX_LEADERS}, got {limit}"
            )));
        }
        let key = format!("daily_leaders:{date}:{limit}:{}", mode.as_str());
        self.cached(&key, || {
            store::daily_leaders(&self.conn, date, limit, mode).map_err(PipelineError::Store)
        })
    }

    pub fn player_time_series(
        &self,
        player_id: i64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> PipelineResult<Vec<PlayerGameRecord>> {
        let player_id = validate_player_id(player_id)?;
        if let (Some(s), Some(e)) = (start, end)
            && s > e
        {
            return Err(PipelineError::invalid(format!(
                "start {s} is after end {e}"
            )));
        }
        let bound = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
        let key = format!("player_timeseries:{player_id}:{}:{}", bound(start), bound(end));
        self.cached(&key, || {
            store::player_time_series(&self.conn, player_id, start, end)
                .map_err(PipelineError::Store)
        })
    }

    /// `Ok(None)` results are not cached so a later ingest shows up at once.
    pub fn player_baseline(
        &self,
        player_id: i64,
        season: &str,
        window: usize,
    ) -> PipelineResult<Option<PlayerBaseline>> {
        let season = season.trim();
        let key = format!("player_baseline:{player_id}:{season}:{window}");
        if let Some(hit) = self.lookup::<PlayerBaseline>(&key) {
            return Ok(Some(hit));
        }
        let baseline = load_player_baseline(&self.conn, &self.calendar, player_id, season, window)?;
        if let Some(b) = &baseline {
            self.store_value(&key, b);
        }
        Ok(baseline)
    }

    fn cached<T, F>(&self, key: &str, load: F) -> PipelineResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> PipelineResult<T>,
    {
        if let Some(hit) = self.lookup(key) {
            return Ok(hit);
        }
        let value = load()?;
        self.store_value(key, &value);
        Ok(value)
    }

    fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key)?;
        match serde_json::from_value(raw) {
            Ok(v) => {
                debug!(key, "cache hit");
                Some(v)
            }
            Err(err) => {
                debug!(key, error = %err, "cache entry ignored");
                None
            }
        }
    }

    fn store_value<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(raw) = serde_json::to_value(value) {
            self.cache.set(key, raw);
        }
    }
}
