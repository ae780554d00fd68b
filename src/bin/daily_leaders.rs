use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;

use hoops_zscore::cli::arg_value;
use hoops_zscore::cache::default_cache;
use hoops_zscore::config::{PipelineConfig, load_dotenv};
use hoops_zscore::service::StatsService;
use hoops_zscore::store::{self, LeaderMode};
use hoops_zscore::telemetry::init_logging;

const DEFAULT_LIMIT: usize = 10;

fn main() -> Result<()> {
    load_dotenv();
    init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = PipelineConfig::from_env()?;
    let db_path = arg_value(&args, "--db")
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.db_path.clone());
    let raw_date = arg_value(&args, "--date").context("--date YYYY-MM-DD is required")?;
    let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .map_err(|_| anyhow!("--date expects YYYY-MM-DD, got '{raw_date}'"))?;
    let limit = match arg_value(&args, "--limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| anyhow!("--limit expects a number, got '{raw}'"))?,
        None => DEFAULT_LIMIT,
    };
    let mode = match arg_value(&args, "--mode") {
        Some(raw) => LeaderMode::parse(&raw).ok_or_else(|| anyhow!("--mode must be best or worst"))?,
        None => LeaderMode::Best,
    };

    let conn = store::open_db(&db_path)?;
    let service = StatsService::new(conn, cfg.calendar.clone(), default_cache(cfg.cache_ttl));
    let rows = service.daily_leaders(date, limit, mode)?;

    println!("{} leaders for {date} ({} rows)", mode.as_str(), rows.len());
    for (rank, r) in rows.iter().enumerate() {
        println!(
            "{:>2}. {:<24} {:<3} {:>2} min  z={:>7.3}",
            rank + 1,
            r.player_name,
            r.team_abbr,
            r.minutes,
            r.z_score
        );
    }
    Ok(())
}
