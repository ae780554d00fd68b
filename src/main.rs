use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;

use hoops_zscore::cli::{arg_value, has_flag};
use hoops_zscore::config::{PipelineConfig, load_dotenv};
use hoops_zscore::fake_source::ScriptedSource;
use hoops_zscore::ingest::{IngestOutcome, default_target_date, run_daily_ingest};
use hoops_zscore::nba_fetch::{BoxscoreSource, StatsApiClient};
use hoops_zscore::store::{self, WriteMode};
use hoops_zscore::telemetry::init_logging;

fn main() -> Result<()> {
    load_dotenv();
    init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = PipelineConfig::from_env()?;
    if let Some(path) = arg_value(&args, "--db") {
        cfg.db_path = PathBuf::from(path);
    }
    if has_flag(&args, "--replace") {
        cfg.write_mode = WriteMode::ReplaceDate;
    }
    let date = match arg_value(&args, "--date") {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| anyhow!("--date expects YYYY-MM-DD, got '{raw}'"))?,
        None => default_target_date(),
    };

    let source: Box<dyn BoxscoreSource> = if has_flag(&args, "--fake") {
        Box::new(ScriptedSource::demo(date))
    } else {
        Box::new(StatsApiClient::new(cfg.retry.request_timeout))
    };

    let mut conn = store::open_db(&cfg.db_path)?;
    let outcome = run_daily_ingest(source.as_ref(), &mut conn, &cfg, date)?;

    println!("Daily ingest complete");
    println!("DB: {}", cfg.db_path.display());
    println!("Date: {date}");
    match &outcome {
        IngestOutcome::NoGames { .. } => println!("No games scheduled"),
        IngestOutcome::NoRows {
            games_listed,
            skipped,
            ..
        } => {
            println!("Games listed: {games_listed}, none produced rows");
            for game in skipped.iter().take(6) {
                println!("   - {} {:?}", game.game_id, game.reason);
            }
        }
        IngestOutcome::Loaded(summary) => {
            println!(
                "Games: {}/{} loaded (profile {})",
                summary.games_loaded, summary.games_listed, summary.profile_version
            );
            println!("Rows loaded: {}", summary.rows_loaded);
            println!("Seasons refreshed: {}", summary.seasons_refreshed.join(", "));
            if !summary.skipped.is_empty() {
                println!("  skipped: {}", summary.skipped.len());
                for game in summary.skipped.iter().take(6) {
                    println!("   - {} {:?}", game.game_id, game.reason);
                }
            }
        }
    }
    let json = serde_json::to_string_pretty(&outcome).context("serialize ingest outcome")?;
    println!("{json}");
    Ok(())
}
