use crate::audit::LogAuditSink;
use crate::cache::{create_cache, Cache};
use crate::config::GateConfig;
use crate::engine::{DecisionEngine, EngineOptions};
use crate::fallback::FallbackPolicy;
use crate::fga_client::{AuthorizationClient, HttpFgaClient};
use approvals::{ApprovalManager, ApprovalManagerOptions};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub cache: Arc<Cache>,
    pub fga_client: Arc<dyn AuthorizationClient>,
    pub approvals: Arc<ApprovalManager>,
    pub engine: Arc<DecisionEngine>,
}

impl AppState {
    /// Creates the application state, wiring every component from the configuration
    pub fn new(config: &GateConfig) -> Result<Self, String> {
        let cache = create_cache(config).map_err(|e| format!("Failed to create cache: {}", e))?;
        let fga_client = HttpFgaClient::new(&config.fga)
            .map_err(|e| format!("Failed to create authorization client: {}", e))?;
        Self::with_components(config, cache, Arc::new(fga_client))
    }

    /// Creates the application state around an existing cache and client
    pub fn with_components(
        config: &GateConfig,
        cache: Cache,
        fga_client: Arc<dyn AuthorizationClient>,
    ) -> Result<Self, String> {
        let cache = Arc::new(cache);
        let fallback = FallbackPolicy::from_config(config)?;
        let approvals = Arc::new(ApprovalManager::new(ApprovalManagerOptions {
            timeout: config.approvals.timeout(),
        }));
        let engine = DecisionEngine::new(
            fga_client.clone(),
            cache.clone(),
            fallback,
            approvals.clone(),
            Arc::new(LogAuditSink),
            EngineOptions::from_config(config),
        );

        Ok(Self {
            config: Arc::new(config.clone()),
            cache,
            fga_client,
            approvals,
            engine: Arc::new(engine),
        })
    }

    #[cfg(test)]
    pub fn for_testing(config: &GateConfig) -> Self {
        Self::new(config).expect("Failed to create test state")
    }
}
