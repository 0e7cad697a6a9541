use crate::config::{CacheBackend, CacheConfig};
use crate::error::{EngineError, Result};
use crate::models::UserProfile;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// In-place edit applied to a cached profile.
pub type ProfileUpdate<'a> = &'a (dyn Fn(&mut UserProfile) + Send + Sync);

const DEFAULT_SWEEP_EVERY: usize = 256;
const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Per-user profile cache. Entries expire lazily after their TTL.
#[async_trait::async_trait]
pub trait ProfileCache: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserProfile>>;
    async fn put(&self, profile: &UserProfile) -> Result<()>;
    async fn invalidate(&self, user_id: Uuid) -> Result<()>;

    /// Applies `apply` to the live entry atomically, keeping its original expiry.
    /// Returns the updated profile, or `None` when nothing is cached for the user.
    async fn update(
        &self,
        user_id: Uuid,
        apply: ProfileUpdate<'_>,
    ) -> Result<Option<UserProfile>>;
}

struct CachedProfile {
    profile: UserProfile,
    stored_at: Instant,
}

pub struct InMemoryProfileCache {
    entries: DashMap<Uuid, CachedProfile>,
    ttl: Duration,
    sweep_every: usize,
    puts: AtomicUsize,
}

impl InMemoryProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            sweep_every: DEFAULT_SWEEP_EVERY,
            puts: AtomicUsize::new(0),
        }
    }

    /// Sweep expired entries once every `puts` writes.
    pub fn with_sweep_every(mut self, puts: usize) -> Self {
        self.sweep_every = puts.max(1);
        self
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired profiles");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl ProfileCache for InMemoryProfileCache {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        if let Some(entry) = self.entries.get(&user_id) {
            if entry.stored_at.elapsed() < self.ttl {
                return Ok(Some(entry.profile.clone()));
            }
        }
        // Expired entries are dropped on read
        self.entries
            .remove_if(&user_id, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        Ok(None)
    }

    async fn put(&self, profile: &UserProfile) -> Result<()> {
        self.entries.insert(
            profile.user_id,
            CachedProfile {
                profile: profile.clone(),
                stored_at: Instant::now(),
            },
        );
        if (self.puts.fetch_add(1, Ordering::Relaxed) + 1) % self.sweep_every == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn invalidate(&self, user_id: Uuid) -> Result<()> {
        self.entries.remove(&user_id);
        Ok(())
    }

    async fn update(
        &self,
        user_id: Uuid,
        apply: ProfileUpdate<'_>,
    ) -> Result<Option<UserProfile>> {
        // The shard write lock is held for the whole edit; `stored_at` stays put
        let updated = match self.entries.get_mut(&user_id) {
            Some(mut entry) if entry.stored_at.elapsed() < self.ttl => {
                apply(&mut entry.profile);
                Some(entry.profile.clone())
            }
            _ => None,
        };
        if updated.is_none() {
            self.entries
                .remove_if(&user_id, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        }
        Ok(updated)
    }
}

pub struct RedisProfileCache {
    client: redis::Client,
    key_prefix: String,
    ttl: Duration,
}

impl RedisProfileCache {
    pub fn new(url: &str, key_prefix: &str, ttl: Duration) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            key_prefix: key_prefix.to_string(),
            ttl,
        })
    }

    fn key(&self, user_id: Uuid) -> String {
        format!("{}:{}", self.key_prefix, user_id)
    }
}

#[async_trait::async_trait]
impl ProfileCache for RedisProfileCache {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(self.key(user_id)).await?;
        match cached {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, profile: &UserProfile) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let data = serde_json::to_string(profile)?;
        let ttl_seconds = self.ttl.as_secs().max(1);
        let _: () = conn.set_ex(self.key(profile.user_id), data, ttl_seconds).await?;
        Ok(())
    }

    async fn invalidate(&self, user_id: Uuid) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(self.key(user_id)).await?;
        Ok(())
    }

    /// Optimistic WATCH/MULTI loop. Needs Redis 6.0+ for `KEEPTTL`.
    async fn update(
        &self,
        user_id: Uuid,
        apply: ProfileUpdate<'_>,
    ) -> Result<Option<UserProfile>> {
        let key = self.key(user_id);
        // WATCH is per connection, so this one cannot be the shared multiplexed one
        let mut conn = self.client.get_async_connection().await?;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let _: () = redis::cmd("WATCH").arg(&key).query_async(&mut conn).await?;
            let cached: Option<String> = conn.get(&key).await?;
            let Some(data) = cached else {
                let _: () = redis::cmd("UNWATCH").query_async(&mut conn).await?;
                return Ok(None);
            };

            let mut profile: UserProfile = serde_json::from_str(&data)?;
            apply(&mut profile);
            let data = serde_json::to_string(&profile)?;

            let committed: Option<(String,)> = redis::pipe()
                .atomic()
                .cmd("SET")
                .arg(&key)
                .arg(data)
                .arg("KEEPTTL")
                .query_async(&mut conn)
                .await?;
            if committed.is_some() {
                return Ok(Some(profile));
            }
            debug!(user_id = %user_id, attempt, "Cached profile changed mid-update, retrying");
        }

        warn!(user_id = %user_id, "Giving up on contended profile update");
        Err(EngineError::Cache(format!(
            "profile {user_id} kept changing during update"
        )))
    }
}

pub fn from_config(config: &CacheConfig, ttl: Duration) -> Result<Arc<dyn ProfileCache>> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(InMemoryProfileCache::new(ttl))),
        CacheBackend::Redis => {
            info!("Using Redis profile cache at {}", config.redis_url);
            Ok(Arc::new(RedisProfileCache::new(
                &config.redis_url,
                &config.key_prefix,
                ttl,
            )?))
        }
    }
}

/// One in-flight profile build per user; later callers wait for the first.
#[derive(Default)]
pub struct SingleFlight {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    user_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: Uuid) -> FlightGuard<'_> {
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        FlightGuard {
            owner: self,
            user_id,
            guard: Some(guard),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map still holds the lock once nobody is waiting on it
        self.owner
            .locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
        debug!(user_id = %self.user_id, "Released profile build slot");
    }
}
