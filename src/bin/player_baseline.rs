use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use hoops_zscore::cli::arg_value;
use hoops_zscore::baseline::DEFAULT_WINDOW;
use hoops_zscore::cache::default_cache;
use hoops_zscore::config::{PipelineConfig, load_dotenv};
use hoops_zscore::service::StatsService;
use hoops_zscore::store;
use hoops_zscore::telemetry::init_logging;

fn main() -> Result<()> {
    load_dotenv();
    init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = PipelineConfig::from_env()?;
    let db_path = arg_value(&args, "--db")
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.db_path.clone());
    let player_id = arg_value(&args, "--player")
        .context("--player ID is required")?
        .parse::<i64>()
        .map_err(|_| anyhow!("--player expects an integer id"))?;
    let season = arg_value(&args, "--season").context("--season YYYY-YY is required")?;
    let window = match arg_value(&args, "--window") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| anyhow!("--window expects a number, got '{raw}'"))?,
        None => DEFAULT_WINDOW,
    };

    let conn = store::open_db(&db_path)?;
    let service = StatsService::new(conn, cfg.calendar.clone(), default_cache(cfg.cache_ttl));
    match service.player_baseline(player_id, &season, window)? {
        Some(baseline) => {
            let json = serde_json::to_string_pretty(&baseline).context("serialize baseline")?;
            println!("{json}");
        }
        None => {
            println!("No games with minutes for player {player_id} in {season}");
        }
    }
    Ok(())
}
