use anyhow::Result;
use clap::{Parser, Subcommand};
use feedrank::{init_tracing, Config, FeedEngine, InMemoryStores, InteractionType, InteractionValue};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// JSON snapshot of candidates, events and orders to load into memory
    #[arg(short, long)]
    snapshot: Option<String>,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Personalized feed for a user
    Feed {
        user_id: Uuid,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print scores alongside the ids
        #[arg(long)]
        scores: bool,
        /// Serve trending content if the profile cannot be built
        #[arg(long)]
        fallback: bool,
    },
    /// Popularity-only ranking
    Trending {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Tag similarity between two videos
    Similarity { a: Uuid, b: Uuid },
    /// Record an interaction, then print the user's profile
    Track {
        user_id: Uuid,
        video_id: Uuid,
        /// view, like, share, order or comment
        kind: InteractionType,
        #[arg(short, long)]
        watch_time: Option<f64>,
    },
    /// Built (or cached) profile for a user
    Profile { user_id: Uuid },
    /// Run one retrain pass over recent interactions
    Retrain,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = Config::load(&args.config)?;
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

    match args.command {
        Command::Feed {
            user_id,
            limit,
            scores: true,
            ..
        } => print_json(&engine.get_ranked_feed(user_id, limit).await?)?,
        Command::Feed {
            user_id,
            limit,
            fallback: true,
            ..
        } => print_json(&engine.get_feed_or_trending(user_id, limit).await?)?,
        Command::Feed { user_id, limit, .. } => {
            print_json(&engine.get_personalized_feed(user_id, limit).await?)?
        }
        Command::Trending { limit } => print_json(&engine.get_trending_content(limit).await?)?,
        Command::Similarity { a, b } => print_json(&engine.get_video_similarity(a, b).await?)?,
        Command::Track {
            user_id,
            video_id,
            kind,
            watch_time,
        } => {
            let value = InteractionValue {
                watch_time_seconds: watch_time,
                ..Default::default()
            };
            engine.track_interaction(user_id, video_id, kind, Some(value)).await?;
            print_json(&engine.get_profile(user_id).await?)?
        }
        Command::Profile { user_id } => print_json(&engine.get_profile(user_id).await?)?,
        Command::Retrain => print_json(&engine.retrain_model().await?)?,
    }

    Ok(())
}
