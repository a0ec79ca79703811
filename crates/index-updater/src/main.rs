//! index-updater: advance every sector and subsector index to the present.
//!
//! Determines each series' resume point from the store, replays the chain
//! builder over new trading days, recomputes rolling indicators against full
//! history, links subsector influence, and upserts the results idempotently.
//!
//! Usage:
//!   cargo run -p index-updater                          # resume all series
//!   cargo run -p index-updater -- --sectors Financials  # restrict the batch
//!   cargo run -p index-updater -- --start-date 2025-06-02
//!   cargo run -p index-updater -- --force               # caught-up fallback
//!   cargo run -p index-updater -- --dry-run

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use index_core::{EngineConfig, EngineError};
use index_store::Db;
use index_updater::{Coordinator, RunOptions};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "index_updater=info,index_engine=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help") {
        eprintln!("Usage:");
        eprintln!("  index-updater                        Resume every series to today");
        eprintln!("  index-updater --sectors A B ...      Restrict to these sectors");
        eprintln!("  index-updater --start-date DATE      Replay from DATE (YYYY-MM-DD), overwriting");
        eprintln!("  index-updater --force                When caught up, recompute from the previous weekday");
        eprintln!("  index-updater --dry-run              Compute and trace without writing");
        eprintln!("  index-updater --db PATH              SQLite path (default: DATABASE_URL or indices.db)");
        std::process::exit(0);
    }

    let force = args.iter().any(|a| a == "--force");
    let dry_run = args.iter().any(|a| a == "--dry-run");

    let db_url = args
        .iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1))
        .map(|p| format!("sqlite:{}?mode=rwc", p))
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite:indices.db?mode=rwc".to_string());

    // A malformed override date is fatal for this invocation; guessing a
    // date would silently recompute the wrong range.
    let start_date = args
        .iter()
        .position(|a| a == "--start-date")
        .and_then(|i| args.get(i + 1))
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| EngineError::InvalidDate(raw.clone()))
        })
        .transpose()?;

    let sectors: Option<Vec<String>> = args.iter().position(|a| a == "--sectors").map(|idx| {
        args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .cloned()
            .collect()
    });

    let config = EngineConfig::default();
    let db = Db::new(&db_url).await?;
    let coordinator = Coordinator::new(db, config)?;

    let opts = RunOptions {
        today: Utc::now().date_naive(),
        force,
        start_date,
        sectors,
        dry_run,
    };

    tracing::info!(
        "index-updater: db={}, today={}, force={}, dry_run={}",
        db_url,
        opts.today,
        force,
        dry_run
    );

    let summary = coordinator.run(&opts).await?;

    let rows: usize = summary.updated.iter().map(|(_, n)| n).sum();
    tracing::info!(
        "Done! {} row(s) across {} series ({} skipped)",
        rows,
        summary.updated.len(),
        summary.skipped.len()
    );
    Ok(())
}
