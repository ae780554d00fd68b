use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::StatAggregate;
use crate::record::PlayerGameRecord;
use crate::zscore::{CATEGORY_COUNT, Category, CategoryMoments, NineCat};

pub const USAGE_QUANTILES: usize = 101;

/// League-wide reference distribution for one season. Means and deviations
/// describe per-player per-game averages, which is what the baseline
/// composer compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueSeasonBaseline {
    pub season: String,
    pub means: NineCat,
    pub stdevs: NineCat,
    /// Deviation of `(fg_pct - mean) * fga` across players.
    pub fg_impact_std: f64,
    pub ft_impact_std: f64,
    /// Usage-per-minute quantiles, index 0 = min, 100 = max.
    pub usage_q101: Vec<f64>,
    #[serde(default)]
    pub sample_players: usize,
    #[serde(default)]
    pub sample_games: usize,
    #[serde(default)]
    pub computed_at: String,
}

impl LeagueSeasonBaseline {
    pub fn validate(&self) -> Result<()> {
        if self.usage_q101.len() != USAGE_QUANTILES {
            return Err(anyhow!(
                "usage quantile table for {} has {} entries, expected {USAGE_QUANTILES}",
                self.season,
                self.usage_q101.len()
            ));
        }
        if self.usage_q101.iter().any(|q| !q.is_finite()) {
            return Err(anyhow!("usage quantile table for {} is not finite", self.season));
        }
        if self.usage_q101.windows(2).any(|w| w[1] < w[0]) {
            return Err(anyhow!(
                "usage quantile table for {} is not non-decreasing",
                self.season
            ));
        }
        let constants = self
            .means
            .iter()
            .chain(self.stdevs.iter())
            .chain([&self.fg_impact_std, &self.ft_impact_std]);
        if constants.into_iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("league constants for {} are not finite", self.season));
        }
        Ok(())
    }

    /// Deviation used for `cat`; percentage categories use the impact deviation.
    pub fn stdev_for(&self, cat: Category) -> f64 {
        match cat {
            Category::FgPct => self.fg_impact_std,
            Category::FtPct => self.ft_impact_std,
            _ => self.stdevs[cat.index()],
        }
    }

    pub fn usage_percentile(&self, usage_per_min: Option<f64>) -> Option<u8> {
        usage_percentile(&self.usage_q101, usage_per_min)
    }
}

/// Number of breakpoints `<= value`, minus one, clamped to 0..=100.
/// `table` must be non-decreasing.
pub fn usage_percentile(table: &[f64], usage_per_min: Option<f64>) -> Option<u8> {
    let value = usage_per_min.filter(|v| v.is_finite())?;
    if table.is_empty() {
        return None;
    }
    let at_or_below = table.partition_point(|q| *q <= value) as i64;
    Some((at_or_below - 1).clamp(0, 100) as u8)
}

/// Linear-interpolated quantiles at 0%, 1%, .., 100%.
pub fn quantiles_101(values: &[f64]) -> Option<Vec<f64>> {
    let mut sorted = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect::<Vec<_>>();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let last = (sorted.len() - 1) as f64;
    let out = (0..USAGE_QUANTILES)
        .map(|i| {
            let pos = last * i as f64 / 100.0;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        })
        .collect();
    Some(out)
}

/// Recomputes a season's baseline from stored game rows. Returns `None`
/// when the season has no qualifying games.
pub fn compute_league_baseline(
    season: &str,
    records: &[PlayerGameRecord],
    computed_at: &str,
) -> Option<LeagueSeasonBaseline> {
    let mut by_player: BTreeMap<i64, Vec<&PlayerGameRecord>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.season == season && r.minutes > 0) {
        by_player.entry(r.player_id).or_default().push(r);
    }
    if by_player.is_empty() {
        return None;
    }
    let sample_games = by_player.values().map(Vec::len).sum();

    let groups = by_player.into_values().collect::<Vec<_>>();
    let players = groups
        .par_iter()
        .filter_map(|games| StatAggregate::from_records(games.iter().copied()))
        .collect::<Vec<_>>();

    let mut means = [0.0; CATEGORY_COUNT];
    let mut stdevs = [1.0; CATEGORY_COUNT];
    for cat in Category::ALL {
        let column = players
            .iter()
            .filter_map(|p| p.category_avg(cat))
            .collect::<Vec<_>>();
        let m = CategoryMoments::from_samples(&column);
        means[cat.index()] = m.mean;
        stdevs[cat.index()] = m.stdev;
    }

    let impact_std = |cat: Category| {
        let mean = means[cat.index()];
        let column = players
            .iter()
            .filter_map(|p| p.category_avg(cat).map(|avg| (avg - mean) * p.attempt_volume(cat)))
            .collect::<Vec<_>>();
        CategoryMoments::from_samples(&column).stdev
    };
    let fg_impact_std = impact_std(Category::FgPct);
    let ft_impact_std = impact_std(Category::FtPct);

    let usage = players
        .iter()
        .filter_map(|p| p.usage_per_min)
        .collect::<Vec<_>>();
    let usage_q101 = quantiles_101(&usage).unwrap_or_else(|| vec![0.0; USAGE_QUANTILES]);

    Some(LeagueSeasonBaseline {
        season: season.to_string(),
        means,
        stdevs,
        fg_impact_std,
        ft_impact_std,
        usage_q101,
        sample_players: players.len(),
        sample_games,
        computed_at: computed_at.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_table() -> Vec<f64> {
        (0..USAGE_QUANTILES).map(|i| i as f64 / 100.0).collect()
    }

    #[test]
    fn percentile_counts_breakpoints_at_or_below() {
        let table = linear_table();
        assert_eq!(usage_percentile(&table, Some(0.0)), Some(0));
        assert_eq!(usage_percentile(&table, Some(0.505)), Some(50));
        assert_eq!(usage_percentile(&table, Some(0.5)), Some(50));
        assert_eq!(usage_percentile(&table, Some(5.0)), Some(100));
        assert_eq!(usage_percentile(&table, Some(-1.0)), Some(0));
        assert_eq!(usage_percentile(&table, None), None);
        assert_eq!(usage_percentile(&table, Some(f64::NAN)), None);
    }

    #[test]
    fn percentile_is_monotonic() {
        let mut table = linear_table();
        table[10..20].iter_mut().for_each(|q| *q = 0.1);
        let mut prev = 0;
        for step in 0..400 {
            let p = usage_percentile(&table, Some(step as f64 / 300.0)).unwrap();
            assert!(p >= prev);
            prev = p;
        }
    }

    #[test]
    fn quantiles_interpolate_and_cover_extremes() {
        let q = quantiles_101(&[4.0, 0.0, 2.0]).unwrap();
        assert_eq!(q.len(), USAGE_QUANTILES);
        assert_eq!(q[0], 0.0);
        assert_eq!(q[50], 2.0);
        assert_eq!(q[100], 4.0);
        assert_eq!(q[25], 1.0);
        assert!(q.windows(2).all(|w| w[0] <= w[1]));
        assert!(quantiles_101(&[]).is_none());
    }

    #[test]
    fn validate_rejects_bad_tables() {
        let mut b = LeagueSeasonBaseline {
            season: "2024-25".into(),
            means: [1.0; CATEGORY_COUNT],
            stdevs: [1.0; CATEGORY_COUNT],
            fg_impact_std: 1.0,
            ft_impact_std: 1.0,
            usage_q101: linear_table(),
            sample_players: 0,
            sample_games: 0,
            computed_at: String::new(),
        };
        assert!(b.validate().is_ok());
        b.usage_q101.swap(3, 4);
        assert!(b.validate().is_err());
        b.usage_q101.truncate(50);
        assert!(b.validate().is_err());
    }
}
