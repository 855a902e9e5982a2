use super::{CacheBackend, CacheError};
use crate::models::AccessQuery;
use async_trait::async_trait;
use std::time::Duration;

/// NullCache is a cache implementation that does nothing.
/// It is used when caching is disabled but the cache interface is still required.
#[derive(Clone, Debug)]
pub struct NullCache;

impl NullCache {
    /// Create a new NullCache instance
    pub fn new() -> Self {
        NullCache
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn generation(&self, _resource: &str) -> u64 {
        0
    }

    async fn get(&self, _query: &AccessQuery) -> Result<Option<bool>, CacheError> {
        // Always a miss
        Ok(None)
    }

    async fn put(
        &self,
        _query: &AccessQuery,
        _allowed: bool,
        _ttl: Duration,
        _generation: u64,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _query: &AccessQuery) {}

    async fn invalidate_resource(&self, _resource: &str) -> usize {
        0
    }

    fn ttl(&self) -> Duration {
        Duration::ZERO
    }

    async fn health_check(&self) -> Result<(), String> {
        // NullCache is always healthy as it doesn't interact with any external systems
        Ok(())
    }
}
