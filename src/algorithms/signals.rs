//! CPU-only signal scorers. Each returns a value in `[0, 1]`.

use crate::error::ScorerError;
use crate::models::{Candidate, UserProfile};
use crate::utils::{age_in_days, age_in_hours, clamp_unit};
use chrono::{DateTime, Utc};

const FAVORITE_CREATOR_BONUS: f64 = 0.4;
const WATCH_TIME_FIT_BONUS: f64 = 0.3;
const WATCH_TIME_TOLERANCE: f64 = 1.2;

const ORDER_ENGAGEMENT_MULTIPLIER: f64 = 5.0;
const POPULARITY_DECAY_DAYS: f64 = 30.0;
const MIN_AGE_FACTOR: f64 = 0.1;

pub const NEUTRAL_LOCATION_SCORE: f64 = 0.5;

pub fn behavior_match(profile: &UserProfile, candidate: &Candidate) -> f64 {
    let mut score = 0.0;

    if profile.behaviors.favorite_creators.contains(&candidate.creator_id) {
        score += FAVORITE_CREATOR_BONUS;
    }

    if candidate.duration_seconds <= profile.behaviors.avg_watch_time * WATCH_TIME_TOLERANCE {
        score += WATCH_TIME_FIT_BONUS;
    }

    score.min(1.0)
}

/// Engagement rate damped by a linear 30-day decay that never drops below 0.1.
pub fn popularity(candidate: &Candidate, now: DateTime<Utc>) -> Result<f64, ScorerError> {
    if candidate.views == 0 {
        return Ok(0.0);
    }

    let engagement_rate = (candidate.likes as f64
        + ORDER_ENGAGEMENT_MULTIPLIER * candidate.order_count as f64)
        / candidate.views as f64;

    let age_days = age_in_days(candidate.created_at, now)?;
    let age_factor = (1.0 - age_days / POPULARITY_DECAY_DAYS).max(MIN_AGE_FACTOR);

    let score = engagement_rate * age_factor;
    if !score.is_finite() {
        return Err(ScorerError::NonFinite("popularity"));
    }
    Ok(clamp_unit(score))
}

pub fn time_relevance(candidate: &Candidate, now: DateTime<Utc>) -> Result<f64, ScorerError> {
    let hours = age_in_hours(candidate.created_at, now)?;

    Ok(if hours < 24.0 {
        1.0
    } else if hours < 72.0 {
        0.8
    } else if hours < 168.0 {
        0.6
    } else {
        0.3
    })
}

/// Extension point for geolocation-aware scoring.
pub trait LocationScorer: Send + Sync {
    fn score(&self, profile: &UserProfile, candidate: &Candidate) -> Result<f64, ScorerError>;
}

/// Used while neither users nor candidates carry a location.
#[derive(Debug, Clone, Default)]
pub struct NeutralLocation;

impl LocationScorer for NeutralLocation {
    fn score(&self, _profile: &UserProfile, _candidate: &Candidate) -> Result<f64, ScorerError> {
        Ok(NEUTRAL_LOCATION_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::Rng;
    use uuid::Uuid;

    fn candidate(hours_old: i64, now: DateTime<Utc>) -> Candidate {
        Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "Paneer tikka")
            .created(now - Duration::hours(hours_old))
    }

    #[test]
    fn test_behavior_match() {
        let creator = Uuid::new_v4();
        let profile = UserProfile::empty(Uuid::new_v4(), 2)
            .with_avg_watch_time(60.0)
            .with_favorite_creators(vec![creator]);

        let short_from_favorite = Candidate::new(Uuid::new_v4(), creator, "a").with_duration(70.0);
        assert!((behavior_match(&profile, &short_from_favorite) - 0.7).abs() < 1e-12);

        let long_from_favorite = Candidate::new(Uuid::new_v4(), creator, "b").with_duration(80.0);
        assert!((behavior_match(&profile, &long_from_favorite) - 0.4).abs() < 1e-12);

        let stranger = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "c").with_duration(500.0);
        assert_eq!(behavior_match(&profile, &stranger), 0.0);
    }

    #[test]
    fn test_popularity_zero_views() {
        let now = Utc::now();
        let c = candidate(1, now).with_engagement(0, 10_000, 500);
        assert_eq!(popularity(&c, now).unwrap(), 0.0);
    }

    #[test]
    fn test_popularity_decay_and_floor() {
        let now = Utc::now();

        let fresh = candidate(0, now).with_engagement(1000, 100, 10);
        assert!((popularity(&fresh, now).unwrap() - 0.15).abs() < 1e-9);

        // 15 days old halves the engagement rate
        let mid = candidate(15 * 24, now).with_engagement(1000, 100, 10);
        assert!((popularity(&mid, now).unwrap() - 0.075).abs() < 1e-9);

        // past 27 days the factor is floored at 0.1
        let old = candidate(90 * 24, now).with_engagement(1000, 100, 10);
        assert!((popularity(&old, now).unwrap() - 0.015).abs() < 1e-9);

        let viral = candidate(0, now).with_engagement(10, 50, 50);
        assert_eq!(popularity(&viral, now).unwrap(), 1.0);
    }

    #[test]
    fn test_time_relevance_steps() {
        let now = Utc::now();
        assert_eq!(time_relevance(&candidate(1, now), now).unwrap(), 1.0);
        assert_eq!(time_relevance(&candidate(48, now), now).unwrap(), 0.8);
        assert_eq!(time_relevance(&candidate(100, now), now).unwrap(), 0.6);
        assert_eq!(time_relevance(&candidate(200, now), now).unwrap(), 0.3);
    }

    #[test]
    fn test_future_content_fails_time_signals() {
        let now = Utc::now();
        let c = candidate(-48, now).with_engagement(100, 10, 1);
        assert_eq!(time_relevance(&c, now), Err(ScorerError::FutureTimestamp));
        assert_eq!(popularity(&c, now), Err(ScorerError::FutureTimestamp));
    }

    #[test]
    fn test_signals_stay_in_unit_interval() {
        let now = Utc::now();
        let mut rng = rand::thread_rng();
        let creator = Uuid::new_v4();
        let profile = UserProfile::empty(Uuid::new_v4(), 2)
            .with_avg_watch_time(rng.gen_range(0.0..600.0))
            .with_favorite_creators(vec![creator]);

        for _ in 0..500 {
            let c = Candidate::new(
                Uuid::new_v4(),
                if rng.gen_bool(0.3) { creator } else { Uuid::new_v4() },
                "random",
            )
            .with_duration(rng.gen_range(0.0..3600.0))
            .with_engagement(
                rng.gen_range(0..100_000),
                rng.gen_range(0..100_000),
                rng.gen_range(0..10_000),
            )
            .created(now - Duration::minutes(rng.gen_range(0..200_000)));

            for score in [
                behavior_match(&profile, &c),
                popularity(&c, now).unwrap(),
                time_relevance(&c, now).unwrap(),
                NeutralLocation.score(&profile, &c).unwrap(),
            ] {
                assert!((0.0..=1.0).contains(&score), "score {score} out of range");
            }
        }
    }
}
