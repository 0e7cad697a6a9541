pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use algorithms::{LocationScorer, RankingWeights, Signal, WeightAdjuster, WeightStore};
pub use config::Config;
pub use error::{EngineError, Result, ScorerError};
pub use models::*;
pub use services::recommendation::{FeedEngine, FeedEngineBuilder};
pub use services::store::{ContentCatalog, InMemoryStores, InteractionLog, OrderHistory};
pub use services::training::RetrainReport;

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
