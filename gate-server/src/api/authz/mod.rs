pub mod check;
pub mod list_objects;
pub mod write;

use crate::errors::ApiError;
use crate::state::AppState;
use axum::routing::post;
use axum::Router;
use std::future::Future;

/// Combines all authorization-related routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/check", post(check::check_handler))
        .route("/write", post(write::write_handler))
        .route("/list-objects", post(list_objects::list_objects_handler))
}

/// Bounds a whole engine call. Dropping the future aborts any in-flight remote call.
pub(crate) async fn with_decision_timeout<T, E>(
    state: &AppState,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, ApiError>
where
    ApiError: From<E>,
{
    match tokio::time::timeout(state.config.decision_timeout(), call).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => {
            log::error!(
                "Authorization decision timed out after {:?}",
                state.config.decision_timeout()
            );
            Err(ApiError::gateway_timeout("Authorization decision timed out"))
        }
    }
}
