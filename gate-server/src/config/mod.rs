pub(crate) use crate::config::approvals::ApprovalsConfig;
pub(crate) use crate::config::cache::{CacheConfig, CacheStore};
pub(crate) use crate::config::fallback::{FallbackConfig, FallbackRule};
pub(crate) use crate::config::fga::{FgaConfig, FgaCredentials};
use confique::Config;
use std::time::Duration;

pub mod approvals;
pub mod cache;
pub mod fallback;
pub mod fga;

/// Default location of the optional TOML config file
const DEFAULT_CONFIG_FILE: &str = "gate.toml";

/// Deployment environment. Development-only conveniences are refused in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            other => Err(format!(
                "Unknown environment '{}', expected 'production' or 'development'",
                other
            )),
        }
    }
}

/// Main configuration structure for the gate server
#[derive(Debug, Config, Clone)]
pub struct GateConfig {
    /// API Key for authentication - mandatory for all API calls
    #[config(env = "GATE_API_KEY")]
    pub api_key: String,

    /// The port the server will listen to (default: 7780)
    #[config(env = "GATE_PORT", default = 7780)]
    pub port: u16,

    /// "production" (default) or "development"
    #[config(env = "GATE_ENVIRONMENT", default = "production")]
    pub environment: String,

    /// Upper bound for a whole decision, including retries (default: 5000 ms)
    #[config(env = "GATE_DECISION_TIMEOUT_MS", default = 5000)]
    pub decision_timeout_ms: u64,

    /// Relation an actor must hold on a resource to grant access to it (default: owner)
    #[config(env = "GATE_GRANT_RELATION", default = "owner")]
    pub grant_relation: String,

    /// Timeout for each health check component in seconds (default: 3)
    #[config(env = "GATE_HEALTHCHECK_TIMEOUT", default = 3.0)]
    pub healthcheck_timeout: f64,

    /// Remote authorization service configuration
    #[config(nested)]
    pub fga: FgaConfig,

    /// Cache configuration
    #[config(nested)]
    pub cache: CacheConfig,

    /// Degraded-mode policy configuration
    #[config(nested)]
    pub fallback: FallbackConfig,

    /// Approval workflow configuration
    #[config(nested)]
    pub approvals: ApprovalsConfig,
}

impl GateConfig {
    /// Loads the configuration from the environment and the optional config
    /// file (`GATE_CONFIG_FILE`, default `gate.toml`), then validates it.
    /// Missing required values fail here instead of falling back to defaults.
    pub fn new() -> Result<Self, String> {
        let path =
            std::env::var("GATE_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config = Self::builder()
            .env()
            .file(path)
            .load()
            .map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints that the loader cannot express
    pub fn validate(&self) -> Result<(), String> {
        let environment = self.environment()?;

        if self.api_key.is_empty() {
            return Err("GATE_API_KEY must not be empty".to_string());
        }
        url::Url::parse(&self.fga.api_url)
            .map_err(|e| format!("Invalid GATE_FGA_API_URL '{}': {}", self.fga.api_url, e))?;
        if self.fga.store_id.is_empty() || self.fga.model_id.is_empty() {
            return Err("GATE_FGA_STORE_ID and GATE_FGA_MODEL_ID must not be empty".to_string());
        }
        self.fga.credentials()?;
        self.cache.validate()?;

        if self.fallback.dev_admin_marker.is_some() && environment == Environment::Production {
            return Err(
                "GATE_FALLBACK_DEV_ADMIN_MARKER is a development-only setting and cannot be used in production"
                    .to_string(),
            );
        }
        // try_from_secs_f64 rejects NaN, negative and overflowing values
        if self.healthcheck_timeout <= 0.0
            || Duration::try_from_secs_f64(self.healthcheck_timeout).is_err()
        {
            return Err(format!(
                "GATE_HEALTHCHECK_TIMEOUT must be a positive number of seconds, got {}",
                self.healthcheck_timeout
            ));
        }
        if self.approvals.timeout_secs == 0 {
            return Err("GATE_APPROVALS_TIMEOUT_SECS must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Parsed deployment environment
    pub fn environment(&self) -> Result<Environment, String> {
        self.environment.parse()
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(fga_mock: &wiremock::MockServer) -> Self {
        Self {
            api_key: "test_api_key".to_string(),
            port: 0, // Let the OS choose a port
            environment: "development".to_string(),
            decision_timeout_ms: 5000,
            grant_relation: "owner".to_string(),
            healthcheck_timeout: 1.0,
            // Use the mock server address for testing
            fga: FgaConfig {
                api_url: fga_mock.uri(),
                store_id: "test-store".to_string(),
                model_id: "test-model".to_string(),
                api_token: Some("test-fga-token".to_string()),
                client_id: None,
                client_secret: None,
                token_issuer: None,
                api_audience: None,
                query_timeout_ms: 500,
                connect_timeout_ms: 200,
                retry_attempts: 1,
                relations: None,
            },
            cache: CacheConfig {
                ttl_secs: 60,
                store: "in-memory".to_string(),
                capacity: 1000,
            },
            fallback: FallbackConfig {
                rules_file: None,
                dev_admin_marker: None,
                rules: Some(vec![FallbackRule {
                    resource: "document:handbook".to_string(),
                    relation: "viewer".to_string(),
                    principals: vec![],
                }]),
            },
            approvals: ApprovalsConfig {
                enabled: true,
                timeout_secs: 60,
                approver_relation: "owner".to_string(),
            },
        }
    }
}
