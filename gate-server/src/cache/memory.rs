use super::{CacheBackend, CacheEntry, CacheError};
use crate::models::AccessQuery;
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use moka::future::Cache as MokaCache;
use moka::policy::EvictionPolicy;
use std::sync::Arc;
use std::time::Duration;

/// How long a generation counter outlives the cache TTL. Must exceed the
/// longest remote check that can still be in flight when a resource is invalidated.
const GENERATION_RETENTION: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct InMemoryCache {
    cache: MokaCache<AccessQuery, String>,
    /// Invalidation generation per resource; absent means 0. Counters expire
    /// once no entry or in-flight check can still refer to them.
    generations: MokaCache<String, u64>,
    ttl: Duration,
}

impl InMemoryCache {
    /// Initialize a new in-memory cache holding at most `capacity` decisions
    pub fn new(ttl_secs: u64, capacity: u64) -> Result<Self, String> {
        if ttl_secs == 0 {
            return Err("Cache TTL must be greater than 0".to_string());
        }
        Ok(Self::with_retention(
            Duration::from_secs(ttl_secs),
            capacity,
            GENERATION_RETENTION,
        ))
    }

    fn with_retention(ttl: Duration, capacity: u64, retention: Duration) -> Self {
        let cache = MokaCache::builder()
            .time_to_live(ttl)
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        // Not capacity bound: evicting a live counter would reset it
        let generations = MokaCache::builder().time_to_live(ttl + retention).build();

        Self {
            cache,
            generations,
            ttl,
        }
    }

    async fn bump_generation(&self, resource: &str) -> u64 {
        self.generations
            .entry(resource.to_string())
            .and_upsert_with(|current| {
                let next = current.map_or(1, |entry| entry.into_value() + 1);
                std::future::ready(next)
            })
            .await
            .into_value()
    }

    /// Store a raw value, bypassing serialization
    #[cfg(test)]
    pub(crate) async fn insert_raw(&self, query: &AccessQuery, raw: &str) {
        self.cache.insert(query.clone(), raw.to_string()).await;
    }

    /// Number of live entries after pending maintenance has run
    #[cfg(test)]
    pub(crate) async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Number of live generation counters after pending maintenance has run
    #[cfg(test)]
    pub(crate) async fn generation_count(&self) -> u64 {
        self.generations.run_pending_tasks().await;
        self.generations.entry_count()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn generation(&self, resource: &str) -> u64 {
        self.generations.get(resource).await.unwrap_or(0)
    }

    async fn get(&self, query: &AccessQuery) -> Result<Option<bool>, CacheError> {
        let Some(raw) = self.cache.get(query).await else {
            return Ok(None);
        };
        let entry: CacheEntry =
            serde_json::from_str(&raw).map_err(|e| CacheError::Corrupted(e.to_string()))?;
        if entry.expires_at <= Utc::now() {
            self.cache.invalidate(query).await;
            return Ok(None);
        }
        Ok(Some(entry.allowed))
    }

    async fn put(
        &self,
        query: &AccessQuery,
        allowed: bool,
        ttl: Duration,
        generation: u64,
    ) -> Result<(), CacheError> {
        if self.generation(&query.resource).await != generation {
            debug!("Not caching {}: resource was invalidated meanwhile", query);
            return Ok(());
        }

        // Entries never outlive the cache-wide TTL
        let ttl = chrono::Duration::from_std(ttl.min(self.ttl))
            .map_err(|e| CacheError::Config(e.to_string()))?;
        let entry = CacheEntry {
            allowed,
            expires_at: Utc::now() + ttl,
        };
        let serialized = serde_json::to_string(&entry)?;
        self.cache.insert(query.clone(), serialized).await;

        // An invalidation that slipped in between the check above and the
        // insert must still win
        if self.generation(&query.resource).await != generation {
            self.cache.invalidate(query).await;
        }
        Ok(())
    }

    async fn remove(&self, query: &AccessQuery) {
        self.cache.invalidate(query).await;
    }

    async fn invalidate_resource(&self, resource: &str) -> usize {
        self.bump_generation(resource).await;

        let keys: Vec<Arc<AccessQuery>> = self
            .cache
            .iter()
            .filter(|(key, _)| key.resource == resource)
            .map(|(key, _)| key)
            .collect();
        for key in &keys {
            self.cache.invalidate(key.as_ref()).await;
        }
        debug!(
            "Invalidated {} cache entries for resource {}",
            keys.len(),
            resource
        );
        keys.len()
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
