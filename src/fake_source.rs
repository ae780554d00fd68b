use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::error::FetchError;
use crate::nba_fetch::BoxscoreSource;
use crate::raw_table::RawTable;
use crate::sync::lock;

const BOXSCORE_HEADERS: [&str; 17] = [
    "GAME_ID",
    "TEAM_ABBREVIATION",
    "PLAYER_ID",
    "PLAYER_NAME",
    "MIN",
    "FGM",
    "FGA",
    "FG_PCT",
    "FG3M",
    "FTA",
    "FT_PCT",
    "REB",
    "AST",
    "STL",
    "BLK",
    "TO",
    "PTS",
];

/// One player's line for a seeded box score.
#[derive(Debug, Clone)]
pub struct SeedLine {
    pub team: &'static str,
    pub player_id: i64,
    pub name: &'static str,
    /// `"MM:SS"`; `None` for did-not-play.
    pub minutes: Option<&'static str>,
    pub fgm: u32,
    pub fga: u32,
    pub fg3m: u32,
    pub ftm: u32,
    pub fta: u32,
    pub reb: u32,
    pub ast: u32,
    pub stl: u32,
    pub blk: u32,
    pub tov: u32,
    pub pts: u32,
}

/// In-process [`BoxscoreSource`] replaying scripted listings and replies.
/// A game with no scripted reply left answers with a timeout.
#[derive(Default)]
pub struct ScriptedSource {
    listings: HashMap<NaiveDate, Vec<String>>,
    listing_error: Option<String>,
    replies: Mutex<HashMap<String, VecDeque<Result<RawTable, FetchError>>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_games(mut self, date: NaiveDate, game_ids: &[&str]) -> Self {
        self.listings
            .insert(date, game_ids.iter().map(|id| id.to_string()).collect());
        self
    }

    /// Every `list_game_ids` call fails with a non-transient error.
    pub fn with_listing_error(mut self, msg: &str) -> Self {
        self.listing_error = Some(msg.to_string());
        self
    }

    pub fn with_reply(self, game_id: &str, reply: Result<RawTable, FetchError>) -> Self {
        lock(&self.replies)
            .entry(game_id.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn with_boxscore(self, game_id: &str, lines: &[SeedLine]) -> Self {
        let table = boxscore_table(game_id, lines);
        self.with_reply(game_id, Ok(table))
    }

    pub fn with_timeouts(mut self, game_id: &str, count: usize) -> Self {
        for _ in 0..count {
            self = self.with_reply(game_id, Err(FetchError::Timeout(Duration::ZERO)));
        }
        self
    }

    pub fn calls(&self, game_id: &str) -> u32 {
        lock(&self.calls).get(game_id).copied().unwrap_or_default()
    }

    /// Two seeded games for `date`, used by `--fake` runs.
    pub fn demo(date: NaiveDate) -> Self {
        Self::new()
            .with_games(date, &["0029900001", "0029900002"])
            .with_boxscore("0029900001", &demo_lines_a())
            .with_boxscore("0029900002", &demo_lines_b())
    }
}

impl BoxscoreSource for ScriptedSource {
    fn list_game_ids(&self, date: NaiveDate, _season: &str) -> Result<Vec<String>, FetchError> {
        if let Some(msg) = &self.listing_error {
            return Err(FetchError::Http(msg.clone()));
        }
        Ok(self.listings.get(&date).cloned().unwrap_or_default())
    }

    fn fetch_boxscore(&self, game_id: &str, timeout: Duration) -> Result<RawTable, FetchError> {
        *lock(&self.calls).entry(game_id.to_string()).or_default() += 1;
        lock(&self.replies)
            .get_mut(game_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(FetchError::Timeout(timeout)))
    }
}

/// Builds a `PlayerStats`-shaped table from seed lines.
pub fn boxscore_table(game_id: &str, lines: &[SeedLine]) -> RawTable {
    let headers = BOXSCORE_HEADERS.iter().map(|h| h.to_string()).collect();
    let rows = lines
        .iter()
        .map(|l| {
            let pct = |made: u32, att: u32| -> Value {
                if att == 0 {
                    Value::Null
                } else {
                    json!(f64::from(made) / f64::from(att))
                }
            };
            vec![
                json!(game_id),
                json!(l.team),
                json!(l.player_id),
                json!(l.name),
                l.minutes.map_or(Value::Null, |m| json!(m)),
                json!(l.fgm),
                json!(l.fga),
                pct(l.fgm, l.fga),
                json!(l.fg3m),
                json!(l.fta),
                pct(l.ftm, l.fta),
                json!(l.reb),
                json!(l.ast),
                json!(l.stl),
                json!(l.blk),
                json!(l.tov),
                json!(l.pts),
            ]
        })
        .collect();
    RawTable::new(headers, rows)
}

#[allow(clippy::too_many_arguments)]
fn line(
    team: &'static str,
    player_id: i64,
    name: &'static str,
    minutes: Option<&'static str>,
    shooting: (u32, u32, u32, u32, u32),
    reb: u32,
    ast: u32,
    stl: u32,
    blk: u32,
    tov: u32,
) -> SeedLine {
    let (fgm, fga, fg3m, ftm, fta) = shooting;
    SeedLine {
        team,
        player_id,
        name,
        minutes,
        fgm,
        fga,
        fg3m,
        ftm,
        fta,
        reb,
        ast,
        stl,
        blk,
        tov,
        pts: 2 * fgm + fg3m + ftm,
    }
}

fn demo_lines_a() -> Vec<SeedLine> {
    vec![
        line("BOS", 1628369, "Jayson Tatum", Some("37:12"), (11, 22, 4, 6, 7), 9, 6, 1, 1, 3),
        line("BOS", 1627759, "Jaylen Brown", Some("34:40"), (9, 18, 2, 3, 4), 6, 4, 2, 0, 2),
        line("BOS", 1629057, "Derrick White", Some("31:05"), (5, 11, 3, 2, 2), 4, 5, 1, 2, 1),
        line("BOS", 1630202, "Payton Pritchard", None, (0, 0, 0, 0, 0), 0, 0, 0, 0, 0),
        line("NYK", 1628973, "Jalen Brunson", Some("36:50"), (12, 24, 3, 8, 9), 3, 7, 1, 0, 2),
        line("NYK", 1626157, "Karl-Anthony Towns", Some("33:18"), (8, 15, 2, 4, 5), 12, 2, 0, 1, 3),
        line("NYK", 1628384, "OG Anunoby", Some("35:02"), (6, 13, 3, 1, 2), 5, 1, 2, 1, 1),
    ]
}

fn demo_lines_b() -> Vec<SeedLine> {
    vec![
        line("DEN", 203999, "Nikola Jokic", Some("36:21"), (13, 20, 2, 7, 8), 14, 11, 2, 1, 4),
        line("DEN", 1627750, "Jamal Murray", Some("34:11"), (8, 19, 3, 2, 2), 4, 6, 1, 0, 2),
        line("DEN", 1631128, "Christian Braun", Some("12:30"), (1, 3, 0, 0, 0), 2, 0, 0, 0, 1),
        line("LAL", 2544, "LeBron James", Some("35:40"), (10, 19, 2, 4, 6), 8, 9, 1, 1, 5),
        line("LAL", 1629029, "Luka Doncic", Some("37:02"), (11, 25, 4, 6, 7), 7, 8, 2, 0, 4),
        line("LAL", 1630559, "Austin Reaves", Some("00:00"), (0, 0, 0, 0, 0), 0, 0, 0, 0, 0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_boxscore;

    #[test]
    fn demo_box_scores_normalize_without_dnp_rows() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let source = ScriptedSource::demo(date);
        let ids = source.list_game_ids(date, "2024-25").unwrap();
        assert_eq!(ids.len(), 2);
        let table = source.fetch_boxscore(&ids[1], Duration::from_secs(1)).unwrap();
        let rows = normalize_boxscore(&table, date, &ids[1]);
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.minutes > 0));
    }

    #[test]
    fn exhausted_script_times_out_and_counts_calls() {
        let source = ScriptedSource::new().with_timeouts("g1", 1);
        assert!(matches!(
            source.fetch_boxscore("g1", Duration::from_secs(3)),
            Err(FetchError::Timeout(_))
        ));
        assert!(source.fetch_boxscore("g1", Duration::from_secs(3)).is_err());
        assert_eq!(source.calls("g1"), 2);
        assert!(source.list_game_ids(NaiveDate::MIN, "2024-25").unwrap().is_empty());
    }
}
