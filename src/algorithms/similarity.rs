use crate::models::{Candidate, UserProfile};
use crate::services::embedding::{EmbeddingClient, EmbeddingOutcome};
use crate::utils::clamp_unit;
use nalgebra::DVector;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const CUISINE_MATCH_INCREMENT: f64 = 0.3;

/// Text describing what the user likes: cuisines followed by dietary restrictions.
pub fn preference_text(profile: &UserProfile) -> String {
    profile
        .preferences
        .cuisines
        .iter()
        .chain(profile.preferences.dietary_restrictions.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn content_text(candidate: &Candidate) -> String {
    if candidate.description.is_empty() {
        candidate.title.clone()
    } else {
        format!("{} {}", candidate.title, candidate.description)
    }
}

/// Tag matching used whenever embeddings are unavailable.
///
/// Each profile cuisine found in the candidate's tags or title (case-insensitive
/// substring) contributes 0.3, capped at 1.0.
pub fn fallback_similarity(profile: &UserProfile, candidate: &Candidate) -> f64 {
    let title = candidate.title.to_lowercase();
    let tags: Vec<String> = candidate.tags.iter().map(|t| t.to_lowercase()).collect();

    let matches = profile
        .preferences
        .cuisines
        .iter()
        .map(|c| c.to_lowercase())
        .filter(|cuisine| !cuisine.is_empty())
        .filter(|cuisine| {
            tags.iter().any(|tag| tag.contains(cuisine.as_str()))
                || title.contains(cuisine.as_str())
        })
        .count();

    (CUISINE_MATCH_INCREMENT * matches as f64).min(1.0)
}

/// Cosine similarity of two embeddings clamped to `[0, 1]`.
pub fn embedding_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let a = DVector::from_column_slice(a);
    let b = DVector::from_column_slice(b);
    let norm_a = a.norm();
    let norm_b = b.norm();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        clamp_unit((a.dot(&b) / (norm_a * norm_b)) as f64)
    }
}

/// Jaccard overlap of two candidates' tag sets, case-insensitive.
pub fn tag_jaccard(a: &Candidate, b: &Candidate) -> f64 {
    let tags_a: HashSet<String> = a.tags.iter().map(|t| t.trim().to_lowercase()).collect();
    let tags_b: HashSet<String> = b.tags.iter().map(|t| t.trim().to_lowercase()).collect();

    let union = tags_a.union(&tags_b).count();
    if union == 0 {
        return 0.0;
    }
    tags_a.intersection(&tags_b).count() as f64 / union as f64
}

/// Preference-side embedding, computed once per feed request.
#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceEmbedding {
    Ready(Vec<f32>),
    Unavailable,
}

/// Content similarity with an embedding path and a tag-matching fallback.
///
/// Never fails: any embedding problem degrades to [`fallback_similarity`].
#[derive(Clone)]
pub struct ContentSimilarityScorer {
    client: Arc<dyn EmbeddingClient>,
    timeout: Duration,
}

impl ContentSimilarityScorer {
    pub fn new(client: Arc<dyn EmbeddingClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn uses_embeddings(&self) -> bool {
        self.client.is_enabled()
    }

    pub async fn prepare(&self, profile: &UserProfile) -> PreferenceEmbedding {
        if !self.client.is_enabled() {
            return PreferenceEmbedding::Unavailable;
        }

        let text = preference_text(profile);
        if text.is_empty() {
            return PreferenceEmbedding::Unavailable;
        }

        match self.embed(&text).await {
            Some(vector) => PreferenceEmbedding::Ready(vector),
            None => PreferenceEmbedding::Unavailable,
        }
    }

    pub async fn score(
        &self,
        profile: &UserProfile,
        preference: &PreferenceEmbedding,
        candidate: &Candidate,
    ) -> f64 {
        let PreferenceEmbedding::Ready(preference_vector) = preference else {
            return fallback_similarity(profile, candidate);
        };

        match self.embed(&content_text(candidate)).await {
            Some(content_vector) if content_vector.len() == preference_vector.len() => {
                embedding_similarity(preference_vector, &content_vector)
            }
            Some(content_vector) => {
                warn!(
                    candidate_id = %candidate.id,
                    expected = preference_vector.len(),
                    got = content_vector.len(),
                    "Embedding dimension mismatch, using tag matching"
                );
                fallback_similarity(profile, candidate)
            }
            None => fallback_similarity(profile, candidate),
        }
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match tokio::time::timeout(self.timeout, self.client.embed(text)).await {
            Ok(EmbeddingOutcome::Vector(vector)) if !vector.is_empty() => Some(vector),
            Ok(EmbeddingOutcome::Vector(_)) => {
                warn!("Embedding service returned an empty vector");
                None
            }
            Ok(EmbeddingOutcome::Unavailable(reason)) => {
                debug!("Embedding unavailable: {}", reason);
                None
            }
            Err(_) => {
                warn!("Embedding request timed out after {:?}", self.timeout);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedding::DisabledEmbeddingClient;
    use uuid::Uuid;

    fn profile_with(cuisines: &[&str]) -> UserProfile {
        UserProfile::empty(Uuid::new_v4(), 2)
            .with_cuisines(cuisines.iter().map(|c| c.to_string()).collect())
    }

    fn candidate_with(title: &str, tags: &[&str]) -> Candidate {
        Candidate::new(Uuid::new_v4(), Uuid::new_v4(), title)
            .with_tags(tags.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_fallback_counts_tag_and_title_matches() {
        let profile = profile_with(&["Indian", "Thai", "Italian"]);

        let by_tag = candidate_with("Weeknight curry", &["indian", "spicy"]);
        assert!((fallback_similarity(&profile, &by_tag) - 0.3).abs() < 1e-12);

        let by_title = candidate_with("Thai green curry", &["Indian-fusion"]);
        assert!((fallback_similarity(&profile, &by_title) - 0.6).abs() < 1e-12);

        let none = candidate_with("Tacos al pastor", &["mexican"]);
        assert_eq!(fallback_similarity(&profile, &none), 0.0);
    }

    #[test]
    fn test_fallback_is_capped() {
        let profile = profile_with(&["indian", "thai", "italian", "mexican"]);
        let all = candidate_with("Fusion", &["indian", "thai", "italian", "mexican"]);
        assert_eq!(fallback_similarity(&profile, &all), 1.0);
    }

    #[test]
    fn test_embedding_similarity_clamps_negative() {
        assert_eq!(embedding_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert!((embedding_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(embedding_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(embedding_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_tag_jaccard() {
        let a = candidate_with("a", &["Indian", "curry", "vegan"]);
        let b = candidate_with("b", &["indian", "curry", "quick"]);
        assert!((tag_jaccard(&a, &b) - 0.5).abs() < 1e-12);

        let empty = candidate_with("c", &[]);
        assert_eq!(tag_jaccard(&empty, &empty), 0.0);
        assert_eq!(tag_jaccard(&a, &a), 1.0);
    }

    #[test]
    fn test_preference_text() {
        let mut profile = profile_with(&["indian", "thai"]);
        profile.preferences.dietary_restrictions.insert("vegan".to_string());
        assert_eq!(preference_text(&profile), "indian thai vegan");
    }

    #[tokio::test]
    async fn test_disabled_client_uses_fallback() {
        let scorer = ContentSimilarityScorer::new(
            Arc::new(DisabledEmbeddingClient),
            Duration::from_millis(100),
        );
        let profile = profile_with(&["indian"]);
        let preference = scorer.prepare(&profile).await;
        assert_eq!(preference, PreferenceEmbedding::Unavailable);

        let candidate = candidate_with("Dal", &["Indian"]);
        let score = scorer.score(&profile, &preference, &candidate).await;
        assert!((score - 0.3).abs() < 1e-12);
    }
}
