use crate::engine::EngineError;
use approvals::ApprovalError;
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub detail: String,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with a detail message and status code
    pub fn new<S: ToString>(detail: S, status_code: StatusCode) -> Self {
        Self {
            detail: detail.to_string(),
            status_code,
        }
    }

    /// Create new Bad Request Error (400) with a detail message
    pub fn bad_request<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::BAD_REQUEST)
    }

    /// Create new Gateway Timeout (504) with a detail message
    pub fn gateway_timeout<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::GATEWAY_TIMEOUT)
    }
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::NotFound(_) => ApiError::new(err, StatusCode::NOT_FOUND),
            ApprovalError::AlreadyResolved { .. } => ApiError::new(err, StatusCode::CONFLICT),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::AuthorizationUnavailable(_) => {
                ApiError::new(err, StatusCode::SERVICE_UNAVAILABLE)
            }
            EngineError::BadRequest(detail) => ApiError::bad_request(detail),
            EngineError::PermissionDenied(detail) => ApiError::new(detail, StatusCode::FORBIDDEN),
            EngineError::Approval(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let body = json!({
            "detail": self.detail,
        });
        (status_code, Json(body)).into_response()
    }
}
