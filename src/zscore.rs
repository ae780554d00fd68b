//! Nine-category weighted z-scores.
//!
//! Composite contract: every composite this crate exposes (the per-game
//! `z_score` and the baseline totals) is rounded to [`COMPOSITE_DECIMALS`]
//! places. Per-category z values are left unrounded.

use serde::{Deserialize, Serialize};

use crate::record::PlayerGameRecord;

pub const CATEGORY_COUNT: usize = 9;
pub const COMPOSITE_DECIMALS: i32 = 3;

pub type NineCat = [f64; CATEGORY_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Pts,
    Reb,
    Ast,
    Stl,
    Blk,
    Fg3m,
    FgPct,
    FtPct,
    Tov,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Pts,
        Category::Reb,
        Category::Ast,
        Category::Stl,
        Category::Blk,
        Category::Fg3m,
        Category::FgPct,
        Category::FtPct,
        Category::Tov,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Pts => "PTS",
            Category::Reb => "REB",
            Category::Ast => "AST",
            Category::Stl => "STL",
            Category::Blk => "BLK",
            Category::Fg3m => "3PM",
            Category::FgPct => "FG%",
            Category::FtPct => "FT%",
            Category::Tov => "TO",
        }
    }

    /// Sign applied to the category's z. Turnovers count against the player.
    pub fn sign(self) -> f64 {
        if self == Category::Tov { -1.0 } else { 1.0 }
    }
}

/// Field-goal and free-throw attempt normalizers for the percentage weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptNorms {
    pub fga: f64,
    pub fta: f64,
}

/// Versioned constants used to score single games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    pub version: String,
    pub means: NineCat,
    pub stdevs: NineCat,
    pub norms: AttemptNorms,
}

impl ScoringProfile {
    pub const INGEST_2024_25: &'static str = "ingest-2024-25";
    pub const NOTEBOOK_2021_22: &'static str = "notebook-2021-22";

    pub fn ingest_2024_25() -> Self {
        Self {
            version: Self::INGEST_2024_25.to_string(),
            means: [11.69, 4.32, 2.76, 0.75, 0.50, 1.28, 0.47, 0.75, 1.33],
            stdevs: [7.23, 2.51, 2.09, 0.38, 0.45, 0.95, 0.082, 0.124, 0.85],
            norms: AttemptNorms {
                fga: 20.0,
                fta: 8.0,
            },
        }
    }

    pub fn notebook_2021_22() -> Self {
        Self {
            version: Self::NOTEBOOK_2021_22.to_string(),
            means: [12.44, 4.71, 2.81, 0.90, 0.60, 1.40, 0.46, 0.77, 1.46],
            stdevs: [6.44, 2.51, 2.08, 0.37, 0.41, 0.92, 0.075, 0.11, 0.90],
            norms: AttemptNorms {
                fga: 10.213,
                fta: 2.575,
            },
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            Self::INGEST_2024_25 => Some(Self::ingest_2024_25()),
            Self::NOTEBOOK_2021_22 => Some(Self::notebook_2021_22()),
            _ => None,
        }
    }

    pub fn score(&self, values: &NineCat, fg_attempts: f64, ft_attempts: f64) -> f64 {
        score(
            values,
            &self.means,
            &self.stdevs,
            fg_attempts,
            ft_attempts,
            self.norms,
        )
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn round_composite(value: f64) -> f64 {
    round_to(value, COMPOSITE_DECIMALS)
}

/// `(value - mean) / stdev`, or 0 when the deviation is zero or anything is
/// non-finite.
pub fn category_z(value: f64, mean: f64, stdev: f64) -> f64 {
    if stdev == 0.0 || !stdev.is_finite() {
        return 0.0;
    }
    let z = (value - mean) / stdev;
    if z.is_finite() { z } else { 0.0 }
}

pub fn attempt_weight(attempts: f64, norm: f64) -> f64 {
    if norm == 0.0 || !norm.is_finite() {
        return 1.0;
    }
    let w = attempts / norm;
    if w.is_finite() { w } else { 0.0 }
}

pub fn category_weights(fg_attempts: f64, ft_attempts: f64, norms: AttemptNorms) -> NineCat {
    [
        1.0,
        1.0,
        1.0,
        1.0,
        1.0,
        1.0,
        attempt_weight(fg_attempts, norms.fga),
        attempt_weight(ft_attempts, norms.fta),
        Category::Tov.sign(),
    ]
}

pub fn weighted_z(
    values: &NineCat,
    means: &NineCat,
    stdevs: &NineCat,
    fg_attempts: f64,
    ft_attempts: f64,
    norms: AttemptNorms,
) -> NineCat {
    let weights = category_weights(fg_attempts, ft_attempts, norms);
    let mut out = [0.0; CATEGORY_COUNT];
    for cat in Category::ALL {
        let i = cat.index();
        out[i] = category_z(values[i], means[i], stdevs[i]) * weights[i];
    }
    out
}

/// Single-game composite: the rounded sum of weighted category z's.
pub fn score(
    values: &NineCat,
    means: &NineCat,
    stdevs: &NineCat,
    fg_attempts: f64,
    ft_attempts: f64,
    norms: AttemptNorms,
) -> f64 {
    let total: f64 = weighted_z(values, means, stdevs, fg_attempts, ft_attempts, norms)
        .iter()
        .sum();
    round_composite(total)
}

pub fn score_records(records: &mut [PlayerGameRecord], profile: &ScoringProfile) {
    for record in records.iter_mut() {
        record.z_score = profile.score(
            &record.category_values(),
            f64::from(record.fg_attempts),
            f64::from(record.ft_attempts),
        );
    }
}

/// Mean and sample standard deviation of one category column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryMoments {
    pub mean: f64,
    pub stdev: f64,
}

impl CategoryMoments {
    /// A deviation that is zero or undefined (fewer than two samples) is
    /// reported as 1.0 so downstream z's stay raw differences.
    pub fn from_samples(samples: &[f64]) -> Self {
        let finite = samples.iter().copied().filter(|v| v.is_finite());
        let (n, sum) = finite.clone().fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
        if n == 0 {
            return Self {
                mean: 0.0,
                stdev: 1.0,
            };
        }
        let mean = sum / n as f64;
        let stdev = if n < 2 {
            1.0
        } else {
            let var = finite.map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            let sd = var.sqrt();
            if sd > 0.0 && sd.is_finite() { sd } else { 1.0 }
        };
        Self { mean, stdev }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEANS: NineCat = [10.0, 5.0, 3.0, 1.0, 1.0, 2.0, 0.5, 0.8, 1.0];
    const STDEVS: NineCat = [5.0, 2.0, 1.0, 0.5, 0.5, 1.0, 0.05, 0.1, 0.5];
    const NORMS: AttemptNorms = AttemptNorms {
        fga: 20.0,
        fta: 8.0,
    };

    #[test]
    fn worked_example_scores_two() {
        let row = [20.0, 5.0, 3.0, 1.0, 1.0, 2.0, 0.5, 0.8, 1.0];
        let weighted = weighted_z(&row, &MEANS, &STDEVS, 0.0, 0.0, NORMS);
        assert_eq!(weighted[0], 2.0);
        assert!(weighted[1..].iter().all(|z| *z == 0.0));
        assert_eq!(score(&row, &MEANS, &STDEVS, 0.0, 0.0, NORMS), 2.0);
    }

    #[test]
    fn zero_attempts_drop_percentage_categories() {
        let row = [14.0, 8.0, 1.0, 2.0, 0.0, 4.0, 0.9, 0.1, 3.0];
        let raw = Category::ALL.map(|c| category_z(row[c.index()], MEANS[c.index()], STDEVS[c.index()]));
        let expected = raw[..6].iter().sum::<f64>() - raw[8];
        let got = score(&row, &MEANS, &STDEVS, 0.0, 0.0, NORMS);
        assert!((got - round_composite(expected)).abs() < 1e-12);
    }

    #[test]
    fn percentage_weight_scales_with_attempts() {
        let mut row = MEANS;
        row[Category::FgPct.index()] = 0.6;
        let few = score(&row, &MEANS, &STDEVS, 5.0, 0.0, NORMS);
        let many = score(&row, &MEANS, &STDEVS, 20.0, 0.0, NORMS);
        assert_eq!(few, 0.5);
        assert_eq!(many, 2.0);
    }

    #[test]
    fn turnovers_count_against() {
        let mut row = MEANS;
        row[Category::Tov.index()] = 2.0;
        assert_eq!(score(&row, &MEANS, &STDEVS, 0.0, 0.0, NORMS), -2.0);
    }

    #[test]
    fn composite_is_finite_with_degenerate_inputs() {
        let zeros = [0.0; CATEGORY_COUNT];
        assert!(score(&zeros, &MEANS, &zeros, 0.0, 0.0, NORMS).is_finite());
        assert!(score(&zeros, &MEANS, &STDEVS, 0.0, 0.0, NORMS) < 0.0);
        let nan_row = [f64::NAN; CATEGORY_COUNT];
        assert_eq!(score(&nan_row, &MEANS, &STDEVS, 10.0, 4.0, NORMS), 0.0);
        let zero_norms = AttemptNorms { fga: 0.0, fta: 0.0 };
        assert!(score(&zeros, &MEANS, &STDEVS, 3.0, 3.0, zero_norms).is_finite());
    }

    #[test]
    fn zero_norm_falls_back_to_unit_weight() {
        assert_eq!(attempt_weight(12.0, 0.0), 1.0);
        assert_eq!(attempt_weight(12.0, 6.0), 2.0);
    }

    #[test]
    fn rounding_is_three_places() {
        assert_eq!(round_composite(1.23456), 1.235);
        assert_eq!(round_composite(-0.0004), -0.0);
        assert_eq!(round_composite(f64::INFINITY), 0.0);
    }

    #[test]
    fn moments_use_sample_deviation() {
        let m = CategoryMoments::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(m.mean, 5.0);
        assert!((m.stdev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(CategoryMoments::from_samples(&[3.0]).stdev, 1.0);
        assert_eq!(CategoryMoments::from_samples(&[3.0, 3.0]).stdev, 1.0);
    }

    #[test]
    fn profiles_resolve_by_name() {
        assert_eq!(
            ScoringProfile::by_name("INGEST-2024-25").map(|p| p.norms.fga),
            Some(20.0)
        );
        assert!(ScoringProfile::by_name("era-1990").is_none());
    }
}
