use crate::algorithms::ranker::{rank_by_popularity, FeedRanker};
use crate::algorithms::signals::{LocationScorer, NeutralLocation};
use crate::algorithms::similarity::{tag_jaccard, ContentSimilarityScorer};
use crate::algorithms::weights::{NoopAdjuster, RankingWeights, WeightAdjuster, WeightStore};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::*;
use crate::services::cache::{self, ProfileCache};
use crate::services::embedding::{self, EmbeddingClient};
use crate::services::profile::ProfileBuilder;
use crate::services::store::{ContentCatalog, InteractionLog, OrderHistory};
use crate::services::tracking::InteractionTracker;
use crate::services::training::{ModelRetrainer, RetrainReport};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

fn catalog_error(e: EngineError) -> EngineError {
    match e {
        EngineError::Catalog(_) => e,
        other => EngineError::Catalog(other.to_string()),
    }
}

/// Entry point for the outer application: feeds, trending, tracking and retraining.
pub struct FeedEngine {
    config: Config,
    catalog: Arc<dyn ContentCatalog>,
    profiles: ProfileBuilder,
    ranker: FeedRanker,
    tracker: InteractionTracker,
    retrainer: Arc<ModelRetrainer>,
    weights: Arc<WeightStore>,
}

pub struct FeedEngineBuilder {
    config: Config,
    log: Arc<dyn InteractionLog>,
    catalog: Arc<dyn ContentCatalog>,
    orders: Arc<dyn OrderHistory>,
    cache: Option<Arc<dyn ProfileCache>>,
    embedding: Option<Arc<dyn EmbeddingClient>>,
    location: Option<Arc<dyn LocationScorer>>,
    adjuster: Option<Arc<dyn WeightAdjuster>>,
    weights: Option<Arc<WeightStore>>,
}

impl FeedEngineBuilder {
    pub fn cache(mut self, cache: Arc<dyn ProfileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn embedding(mut self, client: Arc<dyn EmbeddingClient>) -> Self {
        self.embedding = Some(client);
        self
    }

    pub fn location_scorer(mut self, scorer: Arc<dyn LocationScorer>) -> Self {
        self.location = Some(scorer);
        self
    }

    pub fn weight_adjuster(mut self, adjuster: Arc<dyn WeightAdjuster>) -> Self {
        self.adjuster = Some(adjuster);
        self
    }

    pub fn weight_store(mut self, weights: Arc<WeightStore>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Anything not injected is created from the config.
    pub fn build(self) -> Result<FeedEngine> {
        let config = self.config;
        config.validate()?;
        let cache = match self.cache {
            Some(cache) => cache,
            None => cache::from_config(&config.cache, config.profile.cache_ttl())?,
        };
        let embedding = self
            .embedding
            .unwrap_or_else(|| embedding::from_config(&config.embedding));
        let location = self.location.unwrap_or_else(|| Arc::new(NeutralLocation));
        let adjuster = self.adjuster.unwrap_or_else(|| Arc::new(NoopAdjuster));
        let weights = self.weights.unwrap_or_default();

        let similarity = ContentSimilarityScorer::new(embedding, config.embedding.timeout());
        info!(
            "Feed engine ready: candidate pool {}, embeddings {}",
            config.ranking.candidate_pool_size,
            if similarity.uses_embeddings() { "enabled" } else { "disabled" }
        );

        Ok(FeedEngine {
            profiles: ProfileBuilder::new(
                self.log.clone(),
                self.orders,
                cache.clone(),
                config.profile.clone(),
            ),
            ranker: FeedRanker::new(similarity, location, config.ranking.scoring_concurrency),
            tracker: InteractionTracker::new(self.log.clone(), self.catalog.clone(), cache),
            retrainer: Arc::new(ModelRetrainer::new(
                self.log,
                weights.clone(),
                adjuster,
                config.retrainer.clone(),
            )),
            catalog: self.catalog,
            weights,
            config,
        })
    }
}

impl FeedEngine {
    pub fn builder(
        config: Config,
        log: Arc<dyn InteractionLog>,
        catalog: Arc<dyn ContentCatalog>,
        orders: Arc<dyn OrderHistory>,
    ) -> FeedEngineBuilder {
        FeedEngineBuilder {
            config,
            log,
            catalog,
            orders,
            cache: None,
            embedding: None,
            location: None,
            adjuster: None,
            weights: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Top candidate ids for the user, best first.
    pub async fn get_personalized_feed(
        &self,
        user_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<Uuid>> {
        let ranked = self.get_ranked_feed(user_id, limit).await?;
        Ok(ranked.into_iter().map(|entry| entry.candidate_id).collect())
    }

    /// Like [`get_personalized_feed`](Self::get_personalized_feed), with scores attached.
    pub async fn get_ranked_feed(
        &self,
        user_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<RankedEntry>> {
        let limit = limit.unwrap_or(self.config.ranking.default_feed_limit);
        let profile = self.profiles.get_or_build(user_id).await?;
        let candidates = self.candidate_pool().await?;

        let weights = self.weights.snapshot();
        let ranked = self
            .ranker
            .rank(&profile, candidates, &weights, limit, Utc::now())
            .await;

        debug!(user_id = %user_id, returned = ranked.len(), "Ranked feed");
        Ok(ranked)
    }

    /// Personalized feed, or trending content when the user's history is unreachable.
    pub async fn get_feed_or_trending(
        &self,
        user_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<Uuid>> {
        match self.get_personalized_feed(user_id, limit).await {
            Err(EngineError::ProfileBuild(reason)) => {
                warn!(user_id = %user_id, "Serving trending feed, profile unavailable: {}", reason);
                let limit = limit.unwrap_or(self.config.ranking.default_feed_limit);
                self.get_trending_content(Some(limit)).await
            }
            other => other,
        }
    }

    pub async fn track_interaction(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        interaction_type: InteractionType,
        value: Option<InteractionValue>,
    ) -> Result<()> {
        self.tracker
            .track_interaction(user_id, video_id, interaction_type, value)
            .await
    }

    /// Tag-overlap Jaccard similarity between two catalog items.
    pub async fn get_video_similarity(&self, a: Uuid, b: Uuid) -> Result<f64> {
        let (first, second) = tokio::try_join!(
            self.catalog.get_candidate(a),
            self.catalog.get_candidate(b),
        )
        .map_err(catalog_error)?;

        let first = first.ok_or(EngineError::CandidateNotFound(a))?;
        let second = second.ok_or(EngineError::CandidateNotFound(b))?;
        Ok(tag_jaccard(&first, &second))
    }

    /// Popularity-only ranking over the candidate pool.
    pub async fn get_trending_content(&self, limit: Option<usize>) -> Result<Vec<Uuid>> {
        let limit = limit.unwrap_or(self.config.ranking.default_trending_limit);
        let candidates = self.candidate_pool().await?;
        Ok(rank_by_popularity(candidates, limit, Utc::now())
            .into_iter()
            .map(|entry| entry.candidate_id)
            .collect())
    }

    pub async fn retrain_model(&self) -> Result<RetrainReport> {
        self.retrainer.retrain_model().await
    }

    pub fn retrainer(&self) -> &Arc<ModelRetrainer> {
        &self.retrainer
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile> {
        self.profiles.get_or_build(user_id).await
    }

    pub fn weights(&self) -> RankingWeights {
        self.weights.snapshot()
    }

    async fn candidate_pool(&self) -> Result<Vec<Candidate>> {
        self.catalog
            .list_candidates(&CandidateFilter::default(), self.config.ranking.candidate_pool_size)
            .await
            .map_err(catalog_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryStores;
    use chrono::Duration;

    fn engine(stores: &InMemoryStores) -> FeedEngine {
        FeedEngine::builder(
            Config::default(),
            stores.interactions.clone(),
            stores.catalog.clone(),
            stores.orders.clone(),
        )
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn test_feed_respects_default_and_explicit_limits() {
        let stores = InMemoryStores::new();
        let now = Utc::now();
        for i in 0..30 {
            stores
                .catalog
                .insert(
                    Candidate::new(Uuid::new_v4(), Uuid::new_v4(), format!("Recipe {i}"))
                        .with_engagement(100, i, 0)
                        .created(now - Duration::hours(i as i64)),
                )
                .await;
        }
        let engine = engine(&stores);
        let user = Uuid::new_v4();

        assert_eq!(engine.get_personalized_feed(user, None).await.unwrap().len(), 20);
        assert_eq!(engine.get_personalized_feed(user, Some(3)).await.unwrap().len(), 3);
        assert!(engine.get_personalized_feed(user, Some(0)).await.unwrap().is_empty());
        assert_eq!(engine.get_trending_content(None).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_video_similarity() {
        let stores = InMemoryStores::new();
        let tags = |t: &[&str]| t.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let a = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Pad thai")
            .with_tags(tags(&["thai", "noodles"]));
        let b = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Khao soi")
            .with_tags(tags(&["thai", "curry"]));
        stores.catalog.batch_insert(vec![a.clone(), b.clone()]).await;
        let engine = engine(&stores);

        let similarity = engine.get_video_similarity(a.id, b.id).await.unwrap();
        assert!((similarity - 1.0 / 3.0).abs() < 1e-12);

        let missing = Uuid::new_v4();
        match engine.get_video_similarity(a.id, missing).await {
            Err(EngineError::CandidateNotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected CandidateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_weights_start_at_defaults() {
        let engine = engine(&InMemoryStores::new());
        assert_eq!(engine.weights(), RankingWeights::default());
        let report = engine.retrain_model().await.unwrap();
        assert_eq!(report.scanned, 0);
        assert_eq!(report.weights, RankingWeights::default());
    }
}
