use crate::error::ScorerError;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;

pub mod validation;

/// Creation times this far ahead of `now` are tolerated as clock skew.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 300;

/// Clamps into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Hours elapsed since `created_at`. Small future offsets count as zero age.
pub fn age_in_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<f64, ScorerError> {
    let elapsed = now.signed_duration_since(created_at);
    if elapsed < -Duration::seconds(CLOCK_SKEW_TOLERANCE_SECS) {
        return Err(ScorerError::FutureTimestamp);
    }
    Ok((elapsed.num_milliseconds().max(0) as f64) / 3_600_000.0)
}

pub fn age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<f64, ScorerError> {
    age_in_hours(created_at, now).map(|hours| hours / 24.0)
}

/// Top `k` keys by occurrence count; ties go to the most recent occurrence, then key order.
pub fn top_k_by_frequency<K, I>(occurrences: I, k: usize) -> Vec<K>
where
    K: Eq + Hash + Ord + Clone,
    I: IntoIterator<Item = (K, DateTime<Utc>)>,
{
    let mut tally: HashMap<K, (usize, DateTime<Utc>)> = HashMap::new();
    for (key, seen_at) in occurrences {
        let entry = tally.entry(key).or_insert((0, seen_at));
        entry.0 += 1;
        if seen_at > entry.1 {
            entry.1 = seen_at;
        }
    }

    let mut ranked: Vec<(K, usize, DateTime<Utc>)> = tally
        .into_iter()
        .map(|(key, (count, last_seen))| (key, count, last_seen))
        .collect();

    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| b.2.cmp(&a.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    ranked.into_iter().take(k).map(|(key, _, _)| key).collect()
}
