use anyhow::Result;
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use scout::db::Database;
use scout::fetch::SafeFetcher;
use scout::logging::configure_logging;
use scout::relevance::KeywordProfile;
use scout::robots::RobotsCache;
use scout::sweep::{Sweeper, SweepTrigger};
use scout::TARGET_SWEEP;

#[derive(Parser)]
#[clap(name = "scout", about = "Monitor news sources and ingest matching articles")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sweep and print the result as JSON
    Sweep {
        /// Sweep a single source by id, bypassing the schedule
        #[clap(short, long)]
        source_id: Option<i64>,
    },

    /// Sweep on a fixed cadence until interrupted
    Watch {
        /// Seconds between scheduled sweeps
        #[clap(short, long, default_value = "600")]
        interval_secs: u64,
    },

    /// Start monitoring a new source
    Add {
        /// Feed or page URL to monitor
        #[clap(required = true)]
        url: String,

        /// Hours between fetches
        #[clap(short, long, default_value = "24")]
        interval_hours: i64,
    },

    /// List monitored sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let args = Cli::parse();

    let db_path = env::var("SCOUT_DB").unwrap_or_else(|_| "scout.db".to_string());
    let db = Database::new(&db_path).await?;

    let profile = match env::var("SCOUT_PROFILE") {
        Ok(path) => KeywordProfile::from_file(&PathBuf::from(path))?,
        Err(_) => KeywordProfile::default(),
    };

    let sweeper = Sweeper::new(db.clone(), SafeFetcher::new(), RobotsCache::new(), profile);

    match args.command {
        Commands::Sweep { source_id } => {
            let trigger = match source_id {
                Some(source_id) => SweepTrigger::Manual { source_id },
                None => SweepTrigger::Scheduled,
            };
            let result = sweeper.run_sweep(trigger).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Watch { interval_secs } => {
            info!(target: TARGET_SWEEP, "Watching: sweeping every {}s", interval_secs);
            loop {
                match sweeper.run_sweep(SweepTrigger::Scheduled).await {
                    Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                    Err(err) => error!(target: TARGET_SWEEP, "Sweep failed: {}", err),
                }
                sleep(Duration::from_secs(interval_secs)).await;
            }
        }
        Commands::Add {
            url,
            interval_hours,
        } => {
            let source = sweeper.create_source(&url, interval_hours).await?;
            println!(
                "Monitoring {} ({}) as {} every {}h (id {})",
                source.name, source.url, source.kind, source.fetch_interval_hours, source.id
            );
        }
        Commands::Sources => {
            let sources = db.list_sources().await?;
            if sources.is_empty() {
                println!("No sources monitored yet. Add one with `scout add <URL>`.");
            }
            for source in sources {
                let last = source
                    .last_fetched_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:>4}  {:<5} {:>3}h  [{}]  {}  last fetched: {}",
                    source.id,
                    source.kind,
                    source.fetch_interval_hours,
                    if source.enabled { "on" } else { "off" },
                    source.url,
                    last
                );
            }
        }
    }

    Ok(())
}
