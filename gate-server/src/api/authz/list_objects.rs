use super::with_decision_timeout;
use crate::models::DecisionSource;
use crate::openapi::AUTHZ_TAG;
use crate::state::AppState;
use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which resources of a type does a principal hold a relation on?
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct ListObjectsRequest {
    pub principal: String,
    pub relation: String,
    /// Resource type, e.g. `document`
    pub r#type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct ListObjectsResponse {
    pub objects: Vec<String>,
    /// `fallback` when only statically configured resources could be listed
    pub source: DecisionSource,
}

#[utoipa::path(
    post,
    path = "/list-objects",
    tag = AUTHZ_TAG,
    request_body = ListObjectsRequest,
    params(
        ("Authorization" = String, Header, description = "Authorization header"),
    ),
    responses(
        (status = 200, description = "Resources listed", body = ListObjectsResponse),
        (status = 400, description = "Invalid type or relation"),
        (status = 503, description = "Permission system degraded"),
        (status = 504, description = "Decision timed out")
    )
)]
pub(crate) async fn list_objects_handler(
    State(state): State<AppState>,
    Json(request): Json<ListObjectsRequest>,
) -> Response {
    let call = state
        .engine
        .list_objects(&request.principal, &request.relation, &request.r#type);
    match with_decision_timeout(&state, call).await {
        Ok(listed) => (
            StatusCode::OK,
            Json(ListObjectsResponse {
                objects: listed.objects,
                source: listed.source,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
