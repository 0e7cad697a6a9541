use crate::error::Result;
use crate::models::ScoreVector;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ContentSimilarity,
    BehaviorMatch,
    Popularity,
    TimeRelevance,
    LocationRelevance,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::ContentSimilarity,
        Signal::BehaviorMatch,
        Signal::Popularity,
        Signal::TimeRelevance,
        Signal::LocationRelevance,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub content_similarity: f64,
    pub behavior_match: f64,
    pub popularity: f64,
    pub time_relevance: f64,
    pub location_relevance: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            content_similarity: 0.30,
            behavior_match: 0.25,
            popularity: 0.20,
            time_relevance: 0.15,
            location_relevance: 0.10,
        }
    }
}

impl RankingWeights {
    pub fn combine(&self, scores: &ScoreVector) -> f64 {
        scores.content_similarity * self.content_similarity
            + scores.behavior_match * self.behavior_match
            + scores.popularity * self.popularity
            + scores.time_relevance * self.time_relevance
            + scores.location_relevance * self.location_relevance
    }

    pub fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::ContentSimilarity => self.content_similarity,
            Signal::BehaviorMatch => self.behavior_match,
            Signal::Popularity => self.popularity,
            Signal::TimeRelevance => self.time_relevance,
            Signal::LocationRelevance => self.location_relevance,
        }
    }

    fn get_mut(&mut self, signal: Signal) -> &mut f64 {
        match signal {
            Signal::ContentSimilarity => &mut self.content_similarity,
            Signal::BehaviorMatch => &mut self.behavior_match,
            Signal::Popularity => &mut self.popularity,
            Signal::TimeRelevance => &mut self.time_relevance,
            Signal::LocationRelevance => &mut self.location_relevance,
        }
    }
}

/// Weight state owned by the retrainer and read by the ranker.
///
/// Weights only ever move up from their floor (the defaults); a reinforcement can
/// never push a signal below where it started.
#[derive(Debug)]
pub struct WeightStore {
    current: RwLock<RankingWeights>,
    floor: RankingWeights,
}

impl Default for WeightStore {
    fn default() -> Self {
        Self::new(RankingWeights::default())
    }
}

impl WeightStore {
    pub fn new(floor: RankingWeights) -> Self {
        Self {
            current: RwLock::new(floor),
            floor,
        }
    }

    pub fn snapshot(&self) -> RankingWeights {
        *self.current.read()
    }

    pub fn floor(&self) -> RankingWeights {
        self.floor
    }

    /// Raises one signal's weight. Non-positive or non-finite deltas are ignored.
    pub fn reinforce(&self, signal: Signal, delta: f64) -> bool {
        if !delta.is_finite() || delta <= 0.0 {
            return false;
        }
        let mut weights = self.current.write();
        let floor = self.floor.get(signal);
        let weight = weights.get_mut(signal);
        *weight = (*weight + delta).max(floor);
        true
    }

    /// Swaps in a whole set of weights, each held at or above its floor.
    pub fn publish(&self, weights: RankingWeights) {
        let mut next = self.floor;
        for signal in Signal::ALL {
            let proposed = weights.get(signal);
            if proposed.is_finite() {
                *next.get_mut(signal) = proposed.max(self.floor.get(signal));
            }
        }
        *self.current.write() = next;
    }
}

/// Weight-adjustment step invoked by the retrainer for each positive interaction.
#[async_trait::async_trait]
pub trait WeightAdjuster: Send + Sync {
    async fn adjust_weights(
        &self,
        user_id: Uuid,
        candidate_id: Uuid,
        learning_rate: f64,
        weights: &WeightStore,
    ) -> Result<()>;
}

/// Leaves the weights untouched.
#[derive(Debug, Clone, Default)]
pub struct NoopAdjuster;

#[async_trait::async_trait]
impl WeightAdjuster for NoopAdjuster {
    async fn adjust_weights(
        &self,
        _user_id: Uuid,
        _candidate_id: Uuid,
        _learning_rate: f64,
        _weights: &WeightStore,
    ) -> Result<()> {
        Ok(())
    }
}
