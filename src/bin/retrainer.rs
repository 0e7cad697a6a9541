use anyhow::Result;
use clap::Parser;
use feedrank::{init_tracing, Config, FeedEngine, InMemoryStores};
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Periodic ranking-weight retrainer", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long)]
    snapshot: Option<String>,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Overrides `retrainer.interval_seconds`
    #[arg(short, long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("Starting feedrank retrainer");

    let config = Config::load(&args.config)?;
    let interval_seconds = args.interval.unwrap_or(config.retrainer.interval_seconds);
    let every = Duration::from_secs(interval_seconds.max(1));
    info!("Retrainer configuration loaded: {:?}", config.retrainer);

    let stores = match &args.snapshot {
        Some(path) => InMemoryStores::from_snapshot_file(path).await?,
        None => InMemoryStores::new(),
    };
    let engine = FeedEngine::builder(
        config,
        stores.interactions.clone(),
        stores.catalog.clone(),
        stores.orders.clone(),
    )
    .build()?;

    // One pass at startup, then on the schedule
    match engine.retrain_model().await {
        Ok(report) => info!("Initial retrain: {:?}", report),
        Err(e) => error!("Initial retrain failed: {}", e),
    }

    let retrainer = engine.retrainer().clone();
    let schedule = retrainer.clone().spawn_schedule(every);
    info!("Retrainer scheduled every {:?}", every);

    tokio::signal::ctrl_c().await?;
    schedule.abort();

    if let Some(report) = retrainer.last_report() {
        info!("Last retrain report: {:?}", report);
    }
    info!("Retrainer stopped");
    Ok(())
}
