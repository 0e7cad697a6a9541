use crate::algorithms::signals::{self, LocationScorer};
use crate::algorithms::similarity::{ContentSimilarityScorer, PreferenceEmbedding};
use crate::algorithms::weights::RankingWeights;
use crate::error::ScorerError;
use crate::models::{Candidate, RankedEntry, ScoreVector, UserProfile};
use crate::utils::{clamp_unit, validation::validate_candidate};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Score descending, candidate id ascending on ties.
pub fn rank_order(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

pub fn sort_and_truncate(mut entries: Vec<RankedEntry>, limit: usize) -> Vec<RankedEntry> {
    entries.sort_by(rank_order);
    entries.truncate(limit);
    entries
}

fn signal_or_zero(candidate_id: Uuid, signal: &str, result: Result<f64, ScorerError>) -> f64 {
    match result {
        Ok(score) => clamp_unit(score),
        Err(e) => {
            warn!(candidate_id = %candidate_id, signal, "Signal scoring failed, scoring 0: {}", e);
            0.0
        }
    }
}

/// Drops malformed candidates, logging each one.
pub fn well_formed(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|candidate| match validate_candidate(candidate) {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping candidate: {}", e);
                false
            }
        })
        .collect()
}

/// Popularity-only ranking, no personalization.
pub fn rank_by_popularity(
    candidates: Vec<Candidate>,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<RankedEntry> {
    let entries = well_formed(candidates)
        .iter()
        .map(|candidate| RankedEntry {
            candidate_id: candidate.id,
            final_score: signal_or_zero(
                candidate.id,
                "popularity",
                signals::popularity(candidate, now),
            ),
        })
        .collect();

    sort_and_truncate(entries, limit)
}

/// Combines the five signals into one score per candidate and keeps the best `limit`.
#[derive(Clone)]
pub struct FeedRanker {
    similarity: ContentSimilarityScorer,
    location: Arc<dyn LocationScorer>,
    concurrency: usize,
}

impl FeedRanker {
    pub fn new(
        similarity: ContentSimilarityScorer,
        location: Arc<dyn LocationScorer>,
        concurrency: usize,
    ) -> Self {
        Self {
            similarity,
            location,
            concurrency: concurrency.max(1),
        }
    }

    /// Synchronous signals for one candidate; a failing signal scores 0 on its own.
    pub fn score_signals(
        &self,
        profile: &UserProfile,
        candidate: &Candidate,
        content_similarity: f64,
        now: DateTime<Utc>,
    ) -> ScoreVector {
        ScoreVector {
            content_similarity: clamp_unit(content_similarity),
            behavior_match: clamp_unit(signals::behavior_match(profile, candidate)),
            popularity: signal_or_zero(
                candidate.id,
                "popularity",
                signals::popularity(candidate, now),
            ),
            time_relevance: signal_or_zero(
                candidate.id,
                "time_relevance",
                signals::time_relevance(candidate, now),
            ),
            location_relevance: signal_or_zero(
                candidate.id,
                "location_relevance",
                self.location.score(profile, candidate),
            ),
        }
    }

    pub async fn score_candidate(
        &self,
        profile: &UserProfile,
        preference: &PreferenceEmbedding,
        candidate: &Candidate,
        now: DateTime<Utc>,
    ) -> ScoreVector {
        let content_similarity = self.similarity.score(profile, preference, candidate).await;
        self.score_signals(profile, candidate, content_similarity, now)
    }

    /// Ranks the whole candidate set. Dropping the returned future cancels any
    /// in-flight candidate scoring and yields nothing.
    pub async fn rank(
        &self,
        profile: &UserProfile,
        candidates: Vec<Candidate>,
        weights: &RankingWeights,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<RankedEntry> {
        if limit == 0 {
            return Vec::new();
        }

        let candidates = well_formed(candidates);
        if candidates.is_empty() {
            return Vec::new();
        }

        let preference = self.similarity.prepare(profile).await;
        debug!(
            user_id = %profile.user_id,
            candidates = candidates.len(),
            embeddings = matches!(preference, PreferenceEmbedding::Ready(_)),
            "Scoring candidates"
        );

        let preference = &preference;
        // Futures are built eagerly (they are lazy and do nothing until polled) so the
        // stream type carries no higher-ranked closure; this keeps `rank` `Send`.
        let scoring: Vec<_> = candidates
            .iter()
            .map(|candidate| async move {
                let scores = self.score_candidate(profile, preference, candidate, now).await;
                RankedEntry {
                    candidate_id: candidate.id,
                    final_score: weights.combine(&scores),
                }
            })
            .collect();
        let entries: Vec<RankedEntry> = stream::iter(scoring)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        sort_and_truncate(entries, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::signals::NeutralLocation;
    use crate::services::embedding::DisabledEmbeddingClient;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    struct BrokenLocation;

    impl LocationScorer for BrokenLocation {
        fn score(&self, _: &UserProfile, _: &Candidate) -> Result<f64, ScorerError> {
            Err(ScorerError::Strategy("geo index offline".to_string()))
        }
    }

    fn ranker_with(location: Arc<dyn LocationScorer>) -> FeedRanker {
        let similarity = ContentSimilarityScorer::new(
            Arc::new(DisabledEmbeddingClient),
            StdDuration::from_millis(50),
        );
        FeedRanker::new(similarity, location, 8)
    }

    fn entry(id: Uuid, score: f64) -> RankedEntry {
        RankedEntry {
            candidate_id: id,
            final_score: score,
        }
    }

    #[test]
    fn test_sort_breaks_ties_by_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let best = Uuid::from_u128(3);

        let ranked = sort_and_truncate(
            vec![entry(high, 0.5), entry(best, 0.9), entry(low, 0.5)],
            10,
        );
        let ids: Vec<Uuid> = ranked.iter().map(|e| e.candidate_id).collect();
        assert_eq!(ids, vec![best, low, high]);

        assert_eq!(sort_and_truncate(ranked, 2).len(), 2);
    }

    #[tokio::test]
    async fn test_failing_signal_only_zeroes_that_signal() {
        let now = Utc::now();
        let profile = UserProfile::empty(Uuid::new_v4(), 2).with_avg_watch_time(60.0);
        let candidate = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Samosa")
            .with_duration(30.0)
            .with_engagement(100, 10, 0)
            .created(now - Duration::hours(1));

        let ranker = ranker_with(Arc::new(BrokenLocation));
        let scores = ranker
            .score_candidate(&profile, &PreferenceEmbedding::Unavailable, &candidate, now)
            .await;

        assert_eq!(scores.location_relevance, 0.0);
        assert_eq!(scores.time_relevance, 1.0);
        assert!((scores.behavior_match - 0.3).abs() < 1e-12);
        assert!(scores.popularity > 0.0);
    }

    #[tokio::test]
    async fn test_future_candidate_still_ranked() {
        let now = Utc::now();
        let profile = UserProfile::empty(Uuid::new_v4(), 2);
        let future = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Scheduled premiere")
            .with_duration(30.0)
            .created(now + Duration::days(3));

        let ranker = ranker_with(Arc::new(NeutralLocation));
        let ranked = ranker
            .rank(&profile, vec![future.clone()], &RankingWeights::default(), 5, now)
            .await;

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate_id, future.id);
        // only the neutral location signal contributes
        assert!((ranked[0].final_score - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_malformed_candidates_are_skipped() {
        let now = Utc::now();
        let profile = UserProfile::empty(Uuid::new_v4(), 2);
        let good = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Biryani");
        let untitled = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "");
        let orphan = Candidate::new(Uuid::new_v4(), Uuid::nil(), "Orphan");

        let ranker = ranker_with(Arc::new(NeutralLocation));
        let pool = vec![untitled, good.clone(), orphan];
        let ranked = ranker
            .rank(&profile, pool, &RankingWeights::default(), 10, now)
            .await;

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate_id, good.id);
    }

    #[test]
    fn test_rank_by_popularity() {
        let now = Utc::now();
        let hot = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Hot")
            .with_engagement(100, 50, 5)
            .created(now - Duration::hours(2));
        let cold = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Cold")
            .with_engagement(100, 1, 0)
            .created(now - Duration::hours(2));
        let unseen = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Unseen");

        let ranked = rank_by_popularity(vec![cold.clone(), unseen.clone(), hot.clone()], 2, now);
        let ids: Vec<Uuid> = ranked.iter().map(|e| e.candidate_id).collect();
        assert_eq!(ids, vec![hot.id, cold.id]);
    }
}
