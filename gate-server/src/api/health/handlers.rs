use super::checkers::{check_cache_health, check_fga_health, run_health_check};
use super::models::{
    ComponentHealth, ComponentStatus, HealthQuery, HealthResponse, HealthStatusType,
};
use crate::openapi::HEALTH_TAG;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use log::{debug, info};

/// Check the health of all components
async fn check_all_health(state: &AppState, check_cache: bool) -> HealthResponse {
    let fga_handle = tokio::spawn(run_health_check("FGA", check_fga_health, state.clone()));
    let cache_handle = check_cache.then(|| {
        tokio::spawn(run_health_check(
            "Cache",
            check_cache_health,
            state.clone(),
        ))
    });

    let fga = fga_handle.await.unwrap_or_else(|e| {
        log::error!("FGA check task panicked: {e:?}");
        ComponentStatus::error("FGA check task failed")
    });

    let cache = match cache_handle {
        Some(handle) => Some(handle.await.unwrap_or_else(|e| {
            log::error!("Cache check task panicked: {e:?}");
            ComponentStatus::error("Cache check task failed")
        })),
        None => None,
    };

    let components = ComponentHealth { fga, cache };
    let all_healthy = components.all_healthy();

    if !all_healthy {
        let mut issues = Vec::new();
        if !components.fga.is_ok() {
            issues.push(format!(
                "fga: {}",
                components.fga.error.as_deref().unwrap_or("unknown error")
            ));
        }
        if let Some(cache) = components.cache.as_ref().filter(|c| !c.is_ok()) {
            issues.push(format!(
                "cache: {}",
                cache.error.as_deref().unwrap_or("unknown error")
            ));
        }
        info!("Health check failed: {}", issues.join(", "));
    } else {
        debug!("Health check passed for all components");
    }

    HealthResponse {
        status: if all_healthy {
            HealthStatusType::Ok
        } else {
            HealthStatusType::Error
        },
        components,
        status_code: if all_healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        },
    }
}

/// Health check handler - used for all health check endpoints
#[utoipa::path(
    get,
    path = "/health",
    tag = HEALTH_TAG,
    params(
        HealthQuery
    ),
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is not healthy", body = HealthResponse)
    )
)]
pub(crate) async fn health_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> impl IntoResponse {
    check_all_health(&state, params.check_cache).await
}

/// Ready check handler - alias to health check
#[utoipa::path(
    get,
    path = "/ready",
    tag = HEALTH_TAG,
    params(
        HealthQuery
    ),
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is not ready", body = HealthResponse)
    )
)]
pub(crate) async fn ready_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> impl IntoResponse {
    check_all_health(&state, params.check_cache).await
}

/// Healthy check handler - alias to health check
#[utoipa::path(
    get,
    path = "/healthy",
    tag = HEALTH_TAG,
    params(
        HealthQuery
    ),
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is not healthy", body = HealthResponse)
    )
)]
pub(crate) async fn healthy_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> impl IntoResponse {
    check_all_health(&state, params.check_cache).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/healthy", get(healthy_check))
}
