use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Regular seasons tip off in October; anything earlier in the calendar year
/// belongs to the season that started the previous autumn.
pub const SEASON_START_MONTH: u32 = 10;
const SEASON_END_MONTH: u32 = 6;
const SEASON_END_DAY: u32 = 30;

const MIN_START_YEAR: i32 = 1946;
const MAX_START_YEAR: i32 = 2998;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Season {
    start_year: i32,
}

impl Season {
    pub fn from_start_year(start_year: i32) -> Option<Self> {
        (MIN_START_YEAR..=MAX_START_YEAR)
            .contains(&start_year)
            .then_some(Self { start_year })
    }

    pub fn for_date(date: NaiveDate) -> Self {
        let start_year = if date.month() >= SEASON_START_MONTH {
            date.year()
        } else {
            date.year() - 1
        };
        Self { start_year }
    }

    /// Parses `"2024-25"`. The trailing two digits must follow the start year.
    pub fn parse(label: &str) -> Option<Self> {
        let (start, end) = label.trim().split_once('-')?;
        if start.len() != 4 || end.len() != 2 {
            return None;
        }
        if !start.bytes().chain(end.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let start_year = start.parse::<i32>().ok()?;
        let end_short = end.parse::<i32>().ok()?;
        if (start_year + 1) % 100 != end_short {
            return None;
        }
        Self::from_start_year(start_year)
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn label(&self) -> String {
        format!("{}-{:02}", self.start_year, (self.start_year + 1) % 100)
    }

    /// Inclusive date span covering the regular season and playoffs.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_ymd_opt(self.start_year, SEASON_START_MONTH, 1)?;
        let end = NaiveDate::from_ymd_opt(self.start_year + 1, SEASON_END_MONTH, SEASON_END_DAY)?;
        Some((start, end))
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

pub fn season_label(date: NaiveDate) -> String {
    Season::for_date(date).label()
}

/// The set of seasons the read side will answer for.
#[derive(Debug, Clone)]
pub struct SeasonCalendar {
    supported: Vec<Season>,
}

impl Default for SeasonCalendar {
    fn default() -> Self {
        Self::new((2023..=2025).filter_map(Season::from_start_year))
    }
}

impl SeasonCalendar {
    pub fn new<I>(seasons: I) -> Self
    where
        I: IntoIterator<Item = Season>,
    {
        let mut supported = seasons.into_iter().collect::<Vec<_>>();
        supported.sort_unstable();
        supported.dedup();
        Self { supported }
    }

    pub fn supported(&self) -> &[Season] {
        &self.supported
    }

    pub fn resolve(&self, label: &str) -> PipelineResult<Season> {
        let season = Season::parse(label).ok_or_else(|| {
            PipelineError::invalid(format!("malformed season label '{label}' (expected YYYY-YY)"))
        })?;
        if !self.supported.contains(&season) {
            return Err(PipelineError::invalid(format!(
                "unsupported season '{season}'"
            )));
        }
        Ok(season)
    }

    pub fn span(&self, label: &str) -> PipelineResult<(NaiveDate, NaiveDate)> {
        let season = self.resolve(label)?;
        season
            .span()
            .ok_or_else(|| PipelineError::invalid(format!("season '{season}' has no date span")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn season_splits_at_october() {
        assert_eq!(season_label(d(2024, 10, 22)), "2024-25");
        assert_eq!(season_label(d(2025, 1, 2)), "2024-25");
        assert_eq!(season_label(d(2025, 9, 30)), "2024-25");
        assert_eq!(season_label(d(1999, 11, 1)), "1999-00");
    }

    #[test]
    fn parse_rejects_mismatched_years() {
        assert_eq!(Season::parse("2024-25").map(|s| s.start_year()), Some(2024));
        assert!(Season::parse("2024-26").is_none());
        assert!(Season::parse("24-25").is_none());
        assert!(Season::parse("2024/25").is_none());
        assert!(Season::parse("").is_none());
    }

    #[test]
    fn calendar_distinguishes_malformed_and_unsupported() {
        let cal = SeasonCalendar::default();
        assert!(cal.resolve("2024-25").is_ok());
        let err = cal.resolve("1990-91").unwrap_err();
        assert!(err.to_string().contains("unsupported"));
        let err = cal.resolve("nonsense").unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn span_runs_october_through_june() {
        let (start, end) = Season::parse("2024-25").unwrap().span().unwrap();
        assert_eq!(start, d(2024, 10, 1));
        assert_eq!(end, d(2025, 6, 30));
    }
}
