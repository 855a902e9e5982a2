use crate::models::AccessQuery;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod null;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Malformed cache entry: {0}")]
    Corrupted(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Stored form of a cached check result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct CacheEntry {
    pub allowed: bool,
    pub expires_at: DateTime<Utc>,
}

/// Interface of the permission cache backends.
///
/// Keys are `(principal, relation, resource)` triples. Every resource carries a
/// generation counter that `invalidate_resource` bumps; `put` only stores a
/// result computed under the current generation, so a check that raced with a
/// write cannot bring back a stale entry.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Current invalidation generation of a resource, read before a remote check
    async fn generation(&self, resource: &str) -> u64;

    /// Cached result for the query, `Ok(None)` on a miss or an expired entry
    async fn get(&self, query: &AccessQuery) -> Result<Option<bool>, CacheError>;

    /// Store a result obtained while the resource was at `generation`
    async fn put(
        &self,
        query: &AccessQuery,
        allowed: bool,
        ttl: Duration,
        generation: u64,
    ) -> Result<(), CacheError>;

    /// Drop a single entry
    async fn remove(&self, query: &AccessQuery);

    /// Drop every entry referencing the resource. Returns the number of entries removed.
    async fn invalidate_resource(&self, resource: &str) -> usize;

    /// Default lifetime of new entries
    fn ttl(&self) -> Duration;

    /// Returns Ok(()) if healthy, or Err with a descriptive message if unhealthy.
    async fn health_check(&self) -> Result<(), String>;
}

/// Cache implementation that provides a uniform interface regardless of backend.
///
/// The concrete implementation is chosen at runtime based on the application configuration.
#[derive(Clone)]
pub enum Cache {
    /// In-memory LRU cache implementation using Moka
    InMemory(memory::InMemoryCache),
    /// No-op cache implementation that doesn't actually cache anything
    Null(null::NullCache),
}

#[async_trait::async_trait]
impl CacheBackend for Cache {
    async fn generation(&self, resource: &str) -> u64 {
        match self {
            Self::InMemory(cache) => cache.generation(resource).await,
            Self::Null(cache) => cache.generation(resource).await,
        }
    }

    async fn get(&self, query: &AccessQuery) -> Result<Option<bool>, CacheError> {
        match self {
            Self::InMemory(cache) => cache.get(query).await,
            Self::Null(cache) => cache.get(query).await,
        }
    }

    async fn put(
        &self,
        query: &AccessQuery,
        allowed: bool,
        ttl: Duration,
        generation: u64,
    ) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.put(query, allowed, ttl, generation).await,
            Self::Null(cache) => cache.put(query, allowed, ttl, generation).await,
        }
    }

    async fn remove(&self, query: &AccessQuery) {
        match self {
            Self::InMemory(cache) => cache.remove(query).await,
            Self::Null(cache) => cache.remove(query).await,
        }
    }

    async fn invalidate_resource(&self, resource: &str) -> usize {
        match self {
            Self::InMemory(cache) => cache.invalidate_resource(resource).await,
            Self::Null(cache) => cache.invalidate_resource(resource).await,
        }
    }

    fn ttl(&self) -> Duration {
        match self {
            Self::InMemory(cache) => cache.ttl(),
            Self::Null(cache) => cache.ttl(),
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(cache) => cache.health_check().await,
            Self::Null(cache) => cache.health_check().await,
        }
    }
}

/// Factory function to create the appropriate cache implementation based on configuration.
pub fn create_cache(config: &crate::config::GateConfig) -> Result<Cache, CacheError> {
    match config.cache.store().map_err(CacheError::Config)? {
        crate::config::CacheStore::InMemory => {
            let cache = memory::InMemoryCache::new(config.cache.ttl_secs, config.cache.capacity)
                .map_err(CacheError::Config)?;
            Ok(Cache::InMemory(cache))
        }
        crate::config::CacheStore::None => Ok(Cache::Null(null::NullCache::new())),
    }
}
