use std::collections::HashSet;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder};
use tracing::debug;

use crate::error::FetchError;
use crate::http_client::http_client;
use crate::raw_table::{RawTable, parse_result_set};

pub const STATS_BASE_URL: &str = "https://stats.nba.com/stats";
pub const REGULAR_SEASON: &str = "Regular Season";

const GAME_LOG_SET: &str = "LeagueGameLog";
const PLAYER_STATS_SET: &str = "PlayerStats";

/// Upstream box-score provider. Implementations do I/O only.
pub trait BoxscoreSource {
    /// Game ids played on `date`, in upstream order. No games is an empty
    /// list, not an error.
    fn list_game_ids(&self, date: NaiveDate, season: &str) -> Result<Vec<String>, FetchError>;

    fn fetch_boxscore(&self, game_id: &str, timeout: Duration) -> Result<RawTable, FetchError>;
}

#[derive(Debug, Clone)]
pub struct StatsApiClient {
    base_url: String,
    season_type: String,
    list_timeout: Duration,
}

impl StatsApiClient {
    pub fn new(list_timeout: Duration) -> Self {
        Self {
            base_url: STATS_BASE_URL.to_string(),
            season_type: REGULAR_SEASON.to_string(),
            list_timeout,
        }
    }

    fn get_text(&self, request: RequestBuilder, timeout: Duration) -> Result<String, FetchError> {
        let resp = request
            .timeout(timeout)
            .send()
            .map_err(|err| FetchError::from_reqwest(err, timeout))?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|err| FetchError::from_reqwest(err, timeout))?;
        if !status.is_success() {
            let snippet = body.chars().take(200).collect::<String>();
            return Err(FetchError::Http(format!("http {status}: {snippet}")));
        }
        Ok(body)
    }
}

fn shared_client() -> Result<&'static Client, FetchError> {
    http_client().map_err(|err| FetchError::Http(format!("{err:#}")))
}

impl BoxscoreSource for StatsApiClient {
    fn list_game_ids(&self, date: NaiveDate, season: &str) -> Result<Vec<String>, FetchError> {
        let request =
            league_game_log_request(shared_client()?, &self.base_url, date, season, &self.season_type);
        debug!(%date, season, "league game log request");
        let body = self.get_text(request, self.list_timeout)?;
        let table = parse_result_set(&body, GAME_LOG_SET)
            .map_err(|err| FetchError::Decode(format!("{err:#}")))?;
        Ok(game_ids_from_log(&table))
    }

    fn fetch_boxscore(&self, game_id: &str, timeout: Duration) -> Result<RawTable, FetchError> {
        let request = boxscore_request(shared_client()?, &self.base_url, game_id);
        debug!(game_id, ?timeout, "box score request");
        let body = self.get_text(request, timeout)?;
        parse_result_set(&body, PLAYER_STATS_SET)
            .map_err(|err| FetchError::Decode(format!("{err:#}")))
    }
}

/// Team game log for a single day; `Season` and `SeasonType` scope the listing.
pub fn league_game_log_request(
    client: &Client,
    base: &str,
    date: NaiveDate,
    season: &str,
    season_type: &str,
) -> RequestBuilder {
    let day = date.format("%m/%d/%Y").to_string();
    client.get(format!("{base}/leaguegamelog")).query(&[
        ("Counter", "0"),
        ("DateFrom", day.as_str()),
        ("DateTo", day.as_str()),
        ("Direction", "ASC"),
        ("LeagueID", "00"),
        ("PlayerOrTeam", "T"),
        ("Season", season),
        ("SeasonType", season_type),
        ("Sorter", "DATE"),
    ])
}

pub fn boxscore_request(client: &Client, base: &str, game_id: &str) -> RequestBuilder {
    client.get(format!("{base}/boxscoretraditionalv2")).query(&[
        ("EndPeriod", "10"),
        ("EndRange", "28800"),
        ("GameID", game_id),
        ("RangeType", "0"),
        ("StartPeriod", "1"),
        ("StartRange", "0"),
    ])
}

/// The team game log lists each game once per side; keep the first sighting.
pub fn game_ids_from_log(table: &RawTable) -> Vec<String> {
    let mut seen = HashSet::new();
    table
        .iter_rows()
        .filter_map(|row| {
            let v = row.get("GAME_ID")?;
            v.as_str()
                .map(|s| s.trim().to_string())
                .or_else(|| v.as_i64().map(|n| n.to_string()))
        })
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}
