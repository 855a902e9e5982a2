use crate::api::authz::with_decision_timeout;
use crate::errors::ApiError;
use crate::openapi::APPROVALS_TAG;
use crate::state::AppState;
use approvals::{
    ApprovalRequest, ApprovalStatsSnapshot, ApprovalStatus, NewApprovalRequest, Resolution,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/approvals",
            post(create_approval_handler).get(list_approvals_handler),
        )
        .route("/approvals/stats", get(approval_stats_handler))
        .route("/approvals/{id}", get(get_approval_handler))
        .route("/approvals/{id}/resolve", post(resolve_approval_handler))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct ListApprovalsQuery {
    /// Only return requests in this state
    pub status: Option<ApprovalStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct ResolveRequest {
    pub outcome: Resolution,
    /// Approver identity; must hold the approver relation on the resource
    pub resolved_by: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct ResolveResponse {
    pub request: ApprovalRequest,
    /// Whether an approval was written to the authorization service
    pub grant_applied: bool,
}

#[utoipa::path(
    post,
    path = "/approvals",
    tag = APPROVALS_TAG,
    request_body = NewApprovalRequest,
    responses(
        (status = 201, description = "Approval request filed", body = ApprovalRequest),
        (status = 400, description = "Invalid request or approvals disabled")
    )
)]
pub(crate) async fn create_approval_handler(
    State(state): State<AppState>,
    Json(new): Json<NewApprovalRequest>,
) -> Response {
    match state.engine.request_approval(new) {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/approvals",
    tag = APPROVALS_TAG,
    params(ListApprovalsQuery),
    responses(
        (status = 200, description = "Approval requests ordered by creation time", body = Vec<ApprovalRequest>)
    )
)]
pub(crate) async fn list_approvals_handler(
    State(state): State<AppState>,
    Query(query): Query<ListApprovalsQuery>,
) -> Response {
    (StatusCode::OK, Json(state.approvals.list(query.status))).into_response()
}

#[utoipa::path(
    get,
    path = "/approvals/stats",
    tag = APPROVALS_TAG,
    responses(
        (status = 200, description = "Lifecycle counters", body = ApprovalStatsSnapshot)
    )
)]
pub(crate) async fn approval_stats_handler(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.approvals.stats())).into_response()
}

#[utoipa::path(
    get,
    path = "/approvals/{id}",
    tag = APPROVALS_TAG,
    params(("id" = Uuid, Path, description = "Approval request id")),
    responses(
        (status = 200, description = "Current state of the request", body = ApprovalRequest),
        (status = 404, description = "Unknown request")
    )
)]
pub(crate) async fn get_approval_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.approvals.get_status(id) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/approvals/{id}/resolve",
    tag = APPROVALS_TAG,
    params(("id" = Uuid, Path, description = "Approval request id")),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Request resolved", body = ResolveResponse),
        (status = 403, description = "Caller may not approve on this resource"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request already resolved or expired"),
        (status = 503, description = "Permission system degraded")
    )
)]
pub(crate) async fn resolve_approval_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> Response {
    let authorized = with_decision_timeout(
        &state,
        state.engine.authorize_resolution(id, &request.resolved_by),
    )
    .await;
    if let Err(err) = authorized {
        return err.into_response();
    }

    // The status change and the grant are not bounded by the decision timeout
    let resolution = state
        .engine
        .commit_resolution(id, request.outcome, &request.resolved_by)
        .await;
    match resolution {
        Ok(resolution) => (
            StatusCode::OK,
            Json(ResolveResponse {
                request: resolution.request,
                grant_applied: resolution.grant_applied,
            }),
        )
            .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
