mod authn_middleware;
pub(crate) mod approval_requests;
pub(crate) mod authz;
pub(crate) mod health;

use crate::api::authn_middleware::authentication_middleware;
use crate::state::AppState;
use axum::{middleware, Router};

/// Combines all API routes into a single router
pub(super) fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(protected_routes(state))
}

/// Creates a router for protected routes that require API key authentication
fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(authz::router())
        .merge(approval_requests::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            authentication_middleware,
        ))
}
