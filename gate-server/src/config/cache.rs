use confique::Config;

/// Specifies which cache store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStore {
    #[default]
    InMemory,
    None,
}

impl std::str::FromStr for CacheStore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-memory" => Ok(Self::InMemory),
            "none" => Ok(Self::None),
            other => Err(format!(
                "Unknown cache store '{}', expected 'in-memory' or 'none'",
                other
            )),
        }
    }
}

/// Configuration for the permission cache
#[derive(Debug, Config, Clone)]
pub struct CacheConfig {
    /// Lifetime of a cached decision in seconds (default: 10)
    #[config(env = "GATE_CACHE_TTL_SECS", default = 10)]
    pub ttl_secs: u64,

    /// Cache store type: "in-memory" (default) or "none"
    #[config(env = "GATE_CACHE_STORE", default = "in-memory")]
    pub store: String,

    /// Maximum number of cached decisions before LRU eviction (default: 10000)
    #[config(env = "GATE_CACHE_CAPACITY", default = 10000)]
    pub capacity: u64,
}

impl CacheConfig {
    /// Parsed cache store type
    pub fn store(&self) -> Result<CacheStore, String> {
        self.store.parse()
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        if self.store()? == CacheStore::InMemory {
            if self.ttl_secs == 0 {
                return Err("GATE_CACHE_TTL_SECS must be greater than 0".to_string());
            }
            if self.capacity == 0 {
                return Err("GATE_CACHE_CAPACITY must be greater than 0".to_string());
            }
        }
        Ok(())
    }
}
