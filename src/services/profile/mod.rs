use crate::config::ProfileConfig;
use crate::error::{EngineError, Result};
use crate::models::*;
use crate::services::cache::{ProfileCache, SingleFlight};
use crate::services::store::{InteractionLog, OrderHistory};
use crate::utils::top_k_by_frequency;
use chrono::{DateTime, Timelike, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const TOP_CUISINES: usize = 5;
pub const TOP_CREATORS: usize = 5;
pub const TOP_PEAK_TIMES: usize = 3;

const PRICE_FLOOR_RATIO: f64 = 0.7;
const PRICE_CEILING_RATIO: f64 = 1.5;

/// Builds per-user profiles from the interaction log and order history, caching
/// the result.
pub struct ProfileBuilder {
    interactions: Arc<dyn InteractionLog>,
    orders: Arc<dyn OrderHistory>,
    cache: Arc<dyn ProfileCache>,
    flights: Option<SingleFlight>,
    config: ProfileConfig,
}

impl ProfileBuilder {
    pub fn new(
        interactions: Arc<dyn InteractionLog>,
        orders: Arc<dyn OrderHistory>,
        cache: Arc<dyn ProfileCache>,
        config: ProfileConfig,
    ) -> Self {
        let flights = config.single_flight.then(SingleFlight::new);
        Self {
            interactions,
            orders,
            cache,
            flights,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ProfileCache> {
        &self.cache
    }

    /// Cached profile if fresh, otherwise a rebuild from the stores.
    pub async fn get_or_build(&self, user_id: Uuid) -> Result<UserProfile> {
        if let Some(profile) = self.cached(user_id).await {
            return Ok(profile);
        }

        let _flight = match &self.flights {
            Some(flights) => {
                let guard = flights.acquire(user_id).await;
                // Another caller may have finished the build while we waited
                if let Some(profile) = self.cached(user_id).await {
                    return Ok(profile);
                }
                Some(guard)
            }
            None => None,
        };

        let profile = self.build(user_id).await?;
        if let Err(e) = self.cache.put(&profile).await {
            warn!(user_id = %user_id, "Failed to cache profile: {}", e);
        }
        Ok(profile)
    }

    async fn cached(&self, user_id: Uuid) -> Option<UserProfile> {
        match self.cache.get(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user_id, "Profile cache read failed, rebuilding: {}", e);
                None
            }
        }
    }

    /// Rebuilds from the stores, bypassing the cache.
    pub async fn build(&self, user_id: Uuid) -> Result<UserProfile> {
        let (events, orders) = tokio::try_join!(
            self.interactions.query(user_id, self.config.interaction_window),
            self.orders.list_orders(user_id, self.config.order_window),
        )
        .map_err(|e| EngineError::ProfileBuild(format!("user {user_id}: {e}")))?;

        let profile = aggregate_profile(user_id, &events, &orders, &self.config, Utc::now());
        debug!(
            user_id = %user_id,
            events = events.len(),
            orders = orders.len(),
            cuisines = ?profile.preferences.cuisines,
            "Built user profile"
        );
        if !profile.has_history() && orders.is_empty() {
            info!(user_id = %user_id, "No history, using default profile");
        }
        Ok(profile)
    }
}

fn vocabulary(words: &[String]) -> HashSet<String> {
    words.iter().map(|w| w.trim().to_lowercase()).collect()
}

/// Pure aggregation of raw history into a profile.
pub fn aggregate_profile(
    user_id: Uuid,
    events: &[InteractionEvent],
    orders: &[Order],
    config: &ProfileConfig,
    now: DateTime<Utc>,
) -> UserProfile {
    let mut profile = UserProfile::empty(user_id, config.default_spice_level);
    profile.interaction_count = events.len() as u64;
    profile.last_updated = now;

    profile.preferences.cuisines = cuisine_preferences(events, &config.cuisine_vocabulary);
    profile.preferences.dietary_restrictions =
        dietary_restrictions(events, &config.dietary_vocabulary);
    profile.preferences.price_range = price_range(orders);

    profile.behaviors.favorite_creators = favorite_creators(events);
    profile.behaviors.avg_watch_time = average_watch_time(events);
    profile.behaviors.order_frequency = order_frequency(orders, now);
    profile.behaviors.peak_times = peak_times(orders);

    profile
}

/// Top cuisines by frequency. An empty vocabulary admits every tag.
pub fn cuisine_preferences(
    events: &[InteractionEvent],
    cuisine_vocabulary: &[String],
) -> Vec<String> {
    let vocabulary = vocabulary(cuisine_vocabulary);
    let vocabulary = &vocabulary;
    let occurrences = events.iter().flat_map(move |event| {
        event
            .tags
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(move |tag| {
                !tag.is_empty() && (vocabulary.is_empty() || vocabulary.contains(tag))
            })
            .map(move |tag| (tag, event.timestamp))
    });

    top_k_by_frequency(occurrences, TOP_CUISINES)
}

pub fn dietary_restrictions(
    events: &[InteractionEvent],
    dietary_vocabulary: &[String],
) -> BTreeSet<String> {
    let vocabulary = vocabulary(dietary_vocabulary);
    events
        .iter()
        .flat_map(|event| event.tags.iter())
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| vocabulary.contains(tag))
        .collect()
}

pub fn favorite_creators(events: &[InteractionEvent]) -> Vec<Uuid> {
    let occurrences = events
        .iter()
        .filter(|event| event.interaction_type.is_endorsement())
        .filter_map(|event| event.creator_id.map(|creator| (creator, event.timestamp)));

    top_k_by_frequency(occurrences, TOP_CREATORS)
}

pub fn average_watch_time(events: &[InteractionEvent]) -> f64 {
    let watch_times: Vec<f64> = events.iter().filter_map(|e| e.watch_time_seconds).collect();
    if watch_times.is_empty() {
        0.0
    } else {
        watch_times.iter().sum::<f64>() / watch_times.len() as f64
    }
}

pub fn price_range(orders: &[Order]) -> PriceRange {
    if orders.is_empty() {
        return PriceRange::default();
    }

    let average = orders.iter().map(|o| o.amount).sum::<f64>() / orders.len() as f64;
    let min = (average * PRICE_FLOOR_RATIO).max(0.0);
    // refunds can drag the average below zero; the range collapses to its floor
    PriceRange {
        min,
        max: (average * PRICE_CEILING_RATIO).max(min),
    }
}

/// Orders per day between the oldest observed order and `now`, at least one day.
pub fn order_frequency(orders: &[Order], now: DateTime<Utc>) -> f64 {
    let Some(oldest) = orders.iter().map(|o| o.timestamp).min() else {
        return 0.0;
    };

    let window_days = now.signed_duration_since(oldest).num_seconds() as f64 / 86_400.0;
    orders.len() as f64 / window_days.max(1.0)
}

pub fn peak_times(orders: &[Order]) -> Vec<PeakTime> {
    let occurrences = orders
        .iter()
        .map(|order| (PeakTime::from_hour(order.timestamp.hour()), order.timestamp));

    top_k_by_frequency(occurrences, TOP_PEAK_TIMES)
}
