use serde::{Deserialize, Serialize};

use crate::record::PlayerGameRecord;
use crate::zscore::Category;

/// Unweighted per-game averages over a set of games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatAggregate {
    pub games: usize,
    pub minutes: f64,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    pub stl: f64,
    pub blk: f64,
    pub fg3m: f64,
    pub turnovers: f64,
    /// Mean over games that had attempts; `None` when no game did.
    pub fg_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub fga: f64,
    pub fta: f64,
    /// `(fga + fta) / minutes`, `None` when minutes average to zero.
    pub usage_per_min: Option<f64>,
}

#[derive(Default)]
struct Sums {
    games: usize,
    minutes: f64,
    pts: f64,
    reb: f64,
    ast: f64,
    stl: f64,
    blk: f64,
    fg3m: f64,
    turnovers: f64,
    fg_pct: (f64, usize),
    ft_pct: (f64, usize),
    fga: f64,
    fta: f64,
}

impl StatAggregate {
    pub fn from_records<'a, I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a PlayerGameRecord>,
    {
        let mut s = Sums::default();
        for r in records {
            s.games += 1;
            s.minutes += f64::from(r.minutes);
            s.pts += r.pts;
            s.reb += r.reb;
            s.ast += r.ast;
            s.stl += r.stl;
            s.blk += r.blk;
            s.fg3m += r.fg3m;
            s.turnovers += r.turnovers;
            if let Some(p) = r.fg_pct {
                s.fg_pct.0 += p;
                s.fg_pct.1 += 1;
            }
            if let Some(p) = r.ft_pct {
                s.ft_pct.0 += p;
                s.ft_pct.1 += 1;
            }
            s.fga += f64::from(r.fg_attempts);
            s.fta += f64::from(r.ft_attempts);
        }
        if s.games == 0 {
            return None;
        }

        let n = s.games as f64;
        let minutes = s.minutes / n;
        let fga = s.fga / n;
        let fta = s.fta / n;
        let usage_per_min = (minutes > 0.0).then(|| (fga + fta) / minutes);
        let mean_of = |(sum, count): (f64, usize)| (count > 0).then(|| sum / count as f64);

        Some(Self {
            games: s.games,
            minutes,
            pts: s.pts / n,
            reb: s.reb / n,
            ast: s.ast / n,
            stl: s.stl / n,
            blk: s.blk / n,
            fg3m: s.fg3m / n,
            turnovers: s.turnovers / n,
            fg_pct: mean_of(s.fg_pct),
            ft_pct: mean_of(s.ft_pct),
            fga,
            fta,
            usage_per_min,
        })
    }

    pub fn category_avg(&self, cat: Category) -> Option<f64> {
        match cat {
            Category::Pts => Some(self.pts),
            Category::Reb => Some(self.reb),
            Category::Ast => Some(self.ast),
            Category::Stl => Some(self.stl),
            Category::Blk => Some(self.blk),
            Category::Fg3m => Some(self.fg3m),
            Category::FgPct => self.fg_pct,
            Category::FtPct => self.ft_pct,
            Category::Tov => Some(self.turnovers),
        }
    }

    /// Mean attempts backing a percentage category; 1 for counting stats.
    pub fn attempt_volume(&self, cat: Category) -> f64 {
        match cat {
            Category::FgPct => self.fga,
            Category::FtPct => self.fta,
            _ => 1.0,
        }
    }
}
