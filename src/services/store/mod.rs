//! Narrow interfaces over the engine's external collaborators, plus in-memory
//! implementations used by the CLI, the worker and the tests.

use crate::error::{EngineError, Result};
use crate::models::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Append-only engagement log.
#[async_trait::async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append(&self, event: InteractionEvent) -> Result<()>;

    /// Most recent events for one user, newest first.
    async fn query(&self, user_id: Uuid, limit: usize) -> Result<Vec<InteractionEvent>>;

    /// Most recent events across all users, newest first.
    async fn query_recent(&self, limit: usize) -> Result<Vec<InteractionEvent>>;
}

#[async_trait::async_trait]
pub trait ContentCatalog: Send + Sync {
    /// Newest matching candidates first.
    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        limit: usize,
    ) -> Result<Vec<Candidate>>;

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>>;
}

#[async_trait::async_trait]
pub trait OrderHistory: Send + Sync {
    /// Most recent orders for one user, newest first.
    async fn list_orders(&self, user_id: Uuid, limit: usize) -> Result<Vec<Order>>;
}

#[derive(Default)]
pub struct InMemoryInteractionLog {
    events: RwLock<Vec<InteractionEvent>>,
}

impl InMemoryInteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

fn newest_first(
    events: impl Iterator<Item = InteractionEvent>,
    limit: usize,
) -> Vec<InteractionEvent> {
    let mut events: Vec<InteractionEvent> = events.collect();
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    events
}

#[async_trait::async_trait]
impl InteractionLog for InMemoryInteractionLog {
    async fn append(&self, event: InteractionEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn query(&self, user_id: Uuid, limit: usize) -> Result<Vec<InteractionEvent>> {
        let events = self.events.read().await;
        Ok(newest_first(
            events.iter().filter(|e| e.user_id == user_id).cloned(),
            limit,
        ))
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<InteractionEvent>> {
        let events = self.events.read().await;
        Ok(newest_first(events.iter().cloned(), limit))
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    candidates: RwLock<HashMap<Uuid, Candidate>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, candidate: Candidate) {
        self.candidates.write().await.insert(candidate.id, candidate);
    }

    pub async fn batch_insert(&self, candidates: Vec<Candidate>) {
        let mut store = self.candidates.write().await;
        for candidate in candidates {
            store.insert(candidate.id, candidate);
        }
    }
}

#[async_trait::async_trait]
impl ContentCatalog for InMemoryCatalog {
    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let candidates = self.candidates.read().await;
        let mut matching: Vec<Candidate> = candidates
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        Ok(self.candidates.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryOrderHistory {
    orders: RwLock<HashMap<Uuid, Vec<Order>>>,
}

impl InMemoryOrderHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, order: Order) {
        self.orders
            .write()
            .await
            .entry(order.user_id)
            .or_default()
            .push(order);
    }
}

#[async_trait::async_trait]
impl OrderHistory for InMemoryOrderHistory {
    async fn list_orders(&self, user_id: Uuid, limit: usize) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut history = orders.get(&user_id).cloned().unwrap_or_default();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit);
        Ok(history)
    }
}

/// The three in-memory stores, kept together so callers can seed them at once.
#[derive(Clone, Default)]
pub struct InMemoryStores {
    pub interactions: Arc<InMemoryInteractionLog>,
    pub catalog: Arc<InMemoryCatalog>,
    pub orders: Arc<InMemoryOrderHistory>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let stores = Self::new();
        let (candidates, events, orders) = (
            snapshot.candidates.len(),
            snapshot.events.len(),
            snapshot.orders.len(),
        );

        stores.catalog.batch_insert(snapshot.candidates).await;
        for event in snapshot.events {
            stores.interactions.append(event).await?;
        }
        for order in snapshot.orders {
            stores.orders.record(order).await;
        }

        info!(
            "Loaded snapshot: {} candidates, {} events, {} orders",
            candidates, events, orders
        );
        Ok(stores)
    }

    pub async fn from_snapshot_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Store(format!("reading {}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_str(&data)
            .map_err(|e| EngineError::Store(format!("parsing {}: {e}", path.display())))?;
        Self::from_snapshot(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_log_query_is_newest_first_and_limited() {
        let log = InMemoryInteractionLog::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();

        for hours in [5, 1, 3] {
            log.append(
                InteractionEvent::new(user, Uuid::new_v4(), InteractionType::View)
                    .at(now - Duration::hours(hours)),
            )
            .await
            .unwrap();
        }
        log.append(InteractionEvent::new(other, Uuid::new_v4(), InteractionType::Like))
            .await
            .unwrap();

        let events = log.query(user, 2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp > events[1].timestamp);
        assert_eq!(events[0].timestamp, now - Duration::hours(1));

        assert_eq!(log.query_recent(10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_catalog_filters_and_orders() {
        let catalog = InMemoryCatalog::new();
        let now = Utc::now();
        let old =
            Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "old").created(now - Duration::days(3));
        let new =
            Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "new").created(now - Duration::hours(1));
        let hidden = Candidate::new(Uuid::new_v4(), Uuid::new_v4(), "hidden");
        catalog
            .batch_insert(vec![old.clone(), new.clone(), hidden.clone()])
            .await;

        let filter = CandidateFilter {
            exclude_ids: vec![hidden.id],
            created_after: None,
        };
        let listed = catalog.list_candidates(&filter, 10).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);

        assert!(catalog.get_candidate(old.id).await.unwrap().is_some());
        assert!(catalog.get_candidate(Uuid::new_v4()).await.unwrap().is_none());
    }
}
