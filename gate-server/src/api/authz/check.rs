use super::with_decision_timeout;
use crate::engine::{Authorization, Outcome};
use crate::headers::ClientCacheControl;
use crate::models::{AccessQuery, Decision};
use crate::openapi::AUTHZ_TAG;
use crate::state::AppState;
use approvals::ApprovalRequest;
use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use http::header::CACHE_CONTROL;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access check, optionally escalated to an approver when denied
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct CheckRequest {
    /// Authenticated actor, e.g. `user:42`
    pub principal: String,
    /// Requested relation, e.g. `viewer`
    pub relation: String,
    /// Resource as `type:instance-id`
    pub resource: String,
    /// When given, a deny is turned into a pending approval request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct CheckResponse {
    #[serde(flatten)]
    pub decision: Decision,
    pub outcome: Outcome,
    /// The request filed for a pending outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalRequest>,
}

impl From<Authorization> for CheckResponse {
    fn from(authorization: Authorization) -> Self {
        Self {
            decision: authorization.decision,
            outcome: authorization.outcome,
            approval: authorization.approval,
        }
    }
}

#[utoipa::path(
    post,
    path = "/check",
    tag = AUTHZ_TAG,
    request_body = CheckRequest,
    params(
        ("Authorization" = String, Header, description = "Authorization header"),
        ("Cache-Control" = Option<String>, Header, description = "`no-cache` skips the decision cache, `no-store` also skips populating it"),
    ),
    responses(
        (status = 200, description = "Decision made", body = CheckResponse),
        (status = 400, description = "Malformed resource or unknown relation"),
        (status = 503, description = "Permission system degraded"),
        (status = 504, description = "Decision timed out")
    )
)]
pub(crate) async fn check_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckRequest>,
) -> Response {
    let mode = ClientCacheControl::from_header_value(headers.get(CACHE_CONTROL)).cache_mode();
    let query = AccessQuery::new(request.principal, request.relation, request.resource);

    let result = with_decision_timeout(
        &state,
        state
            .engine
            .authorize(&query, request.justification.as_deref(), mode),
    )
    .await;

    match result {
        Ok(authorization) => {
            (StatusCode::OK, Json(CheckResponse::from(authorization))).into_response()
        }
        Err(err) => err.into_response(),
    }
}
