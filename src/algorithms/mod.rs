pub mod ranker;
pub mod signals;
pub mod similarity;
pub mod weights;

pub use ranker::{rank_by_popularity, FeedRanker};
pub use signals::{LocationScorer, NeutralLocation};
pub use similarity::{ContentSimilarityScorer, PreferenceEmbedding};
pub use weights::{NoopAdjuster, RankingWeights, Signal, WeightAdjuster, WeightStore};
