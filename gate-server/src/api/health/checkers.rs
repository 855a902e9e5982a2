use super::models::ComponentStatus;
use crate::cache::CacheBackend;
use crate::state::AppState;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;

pub fn check_fga_health<'a>(
    state: &'a AppState,
) -> Pin<Box<dyn Future<Output = ComponentStatus> + Send + 'a>> {
    let client = state.fga_client.clone();
    Box::pin(async move {
        match client.health_check().await {
            Ok(()) => ComponentStatus::ok(),
            Err(err) => ComponentStatus::error(err),
        }
    })
}

pub fn check_cache_health<'a>(
    state: &'a AppState,
) -> Pin<Box<dyn Future<Output = ComponentStatus> + Send + 'a>> {
    let cache = state.cache.clone();
    Box::pin(async move {
        match cache.as_ref().health_check().await {
            Ok(()) => ComponentStatus::ok(),
            Err(err) => ComponentStatus::error(format!("Cache health check failed: {}", err)),
        }
    })
}

pub async fn run_health_check<F>(
    checker_name: &'static str,
    check_fn: F,
    state: AppState,
) -> ComponentStatus
where
    F: for<'a> FnOnce(&'a AppState) -> Pin<Box<dyn Future<Output = ComponentStatus> + Send + 'a>>
        + Send
        + 'static,
{
    let timeout_duration = Duration::from_secs_f64(state.config.healthcheck_timeout);
    match timeout(timeout_duration, check_fn(&state)).await {
        Ok(status) => status,
        Err(_) => ComponentStatus::error(format!(
            "{} health check timed out after {} seconds",
            checker_name, state.config.healthcheck_timeout
        )),
    }
}
