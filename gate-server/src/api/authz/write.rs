use super::with_decision_timeout;
use crate::errors::ApiError;
use crate::models::AccessQuery;
use crate::openapi::AUTHZ_TAG;
use crate::state::AppState;
use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Grant a relation on behalf of an actor
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct WriteRequest {
    /// Principal performing the grant; must hold the grant relation on the resource
    pub actor: String,
    /// Principal receiving the relation
    pub principal: String,
    pub relation: String,
    pub resource: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct WriteResponse {
    pub success: bool,
}

#[utoipa::path(
    post,
    path = "/write",
    tag = AUTHZ_TAG,
    request_body = WriteRequest,
    params(
        ("Authorization" = String, Header, description = "Authorization header"),
    ),
    responses(
        (status = 200, description = "Relation granted", body = WriteResponse),
        (status = 400, description = "Malformed resource or rejected tuple"),
        (status = 403, description = "Actor may not grant on this resource"),
        (status = 503, description = "Permission system degraded"),
        (status = 504, description = "Decision timed out")
    )
)]
pub(crate) async fn write_handler(
    State(state): State<AppState>,
    Json(request): Json<WriteRequest>,
) -> Response {
    let tuple = AccessQuery::new(request.principal, request.relation, request.resource);
    let authorized =
        with_decision_timeout(&state, state.engine.authorize_write(&request.actor, &tuple)).await;
    if let Err(err) = authorized {
        return err.into_response();
    }

    // Once authorized the write is carried through to invalidation
    match state.engine.commit_write(&tuple).await {
        Ok(()) => {
            log::info!("'{}' granted {}", request.actor, tuple);
            (StatusCode::OK, Json(WriteResponse { success: true })).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}
