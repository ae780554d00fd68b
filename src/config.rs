use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};
use crate::retry::RetryPolicy;
use crate::season::{Season, SeasonCalendar};
use crate::store::{WriteMode, default_db_path};
use crate::zscore::ScoringProfile;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;
const DEFAULT_PACING_MS: u64 = 400;
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_SEASONS: &str = "2023-24,2024-25,2025-26";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    pub retry: RetryPolicy,
    /// Pause between consecutive box-score fetches.
    pub pacing: Duration,
    pub profile: ScoringProfile,
    pub calendar: SeasonCalendar,
    pub write_mode: WriteMode,
    pub cache_ttl: Duration,
}

impl PipelineConfig {
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `HOOPS_*` settings through `lookup`. Unparseable numbers fall back
    /// to their defaults; unknown profile, write mode or season names are
    /// rejected.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let num = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let db_path = get("HOOPS_DB_PATH")
            .map(PathBuf::from)
            .or_else(default_db_path)
            .unwrap_or_else(|| PathBuf::from("games.sqlite"));

        let retry = RetryPolicy {
            max_attempts: (num("HOOPS_RETRY_ATTEMPTS", u64::from(DEFAULT_RETRY_ATTEMPTS))
                .clamp(1, 10)) as u32,
            backoff_unit: Duration::from_millis(num("HOOPS_BACKOFF_UNIT_MS", DEFAULT_BACKOFF_UNIT_MS)),
            request_timeout: Duration::from_secs(
                num("HOOPS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS).max(1),
            ),
        };

        let profile = match get("HOOPS_SCORING_PROFILE") {
            None => ScoringProfile::ingest_2024_25(),
            Some(name) => ScoringProfile::by_name(&name).ok_or_else(|| {
                PipelineError::invalid(format!("unknown scoring profile '{name}'"))
            })?,
        };

        let write_mode = match get("HOOPS_WRITE_MODE") {
            None => WriteMode::Append,
            Some(raw) => WriteMode::parse(&raw)
                .ok_or_else(|| PipelineError::invalid(format!("unknown write mode '{raw}'")))?,
        };

        let seasons_raw = get("HOOPS_SEASONS").unwrap_or_else(|| DEFAULT_SEASONS.to_string());
        let seasons = seasons_raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Season::parse(s)
                    .ok_or_else(|| PipelineError::invalid(format!("malformed season '{s}' in HOOPS_SEASONS")))
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(Self {
            db_path,
            retry,
            pacing: Duration::from_millis(num("HOOPS_PACING_MS", DEFAULT_PACING_MS)),
            profile,
            calendar: SeasonCalendar::new(seasons),
            write_mode,
            cache_ttl: Duration::from_secs(num("HOOPS_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
        })
    }
}

/// Loads `.env.local` then `.env` from the working directory, if present.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}
