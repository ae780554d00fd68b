use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::zscore::NineCat;

/// One player's stat line for one game, as stored.
///
/// Records are only ever built for players who logged minutes; a
/// did-not-play row never becomes a `PlayerGameRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameRecord {
    pub game_date: NaiveDate,
    pub game_id: String,
    pub player_id: i64,
    pub player_name: String,
    pub team_abbr: String,
    pub minutes: u32,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    pub stl: f64,
    pub blk: f64,
    pub fg3m: f64,
    pub turnovers: f64,
    pub fg_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub fg_attempts: u32,
    pub ft_attempts: u32,
    /// Composite score; filled in by `zscore::score_records` before persistence.
    pub z_score: f64,
    pub season: String,
}

impl PlayerGameRecord {
    /// Values in canonical category order. Null percentages read as zero;
    /// they carry zero attempt weight anyway.
    pub fn category_values(&self) -> NineCat {
        [
            self.pts,
            self.reb,
            self.ast,
            self.stl,
            self.blk,
            self.fg3m,
            self.fg_pct.unwrap_or(0.0),
            self.ft_pct.unwrap_or(0.0),
            self.turnovers,
        ]
    }
}
