use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Represents the health status of a component or the overall service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum HealthStatusType {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "error")]
    Error,
}

/// Health check query parameters
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HealthQuery {
    /// Whether to include cache health check
    #[serde(default)]
    pub check_cache: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatusType,
    pub components: ComponentHealth,
    #[serde(skip)]
    pub status_code: StatusCode,
}

/// Health status of individual components
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub fga: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<ComponentStatus>,
}

impl ComponentHealth {
    pub fn all_healthy(&self) -> bool {
        self.fga.is_ok() && self.cache.as_ref().is_none_or(ComponentStatus::is_ok)
    }
}

/// Status of an individual component
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub status: HealthStatusType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentStatus {
    pub fn ok() -> Self {
        Self {
            status: HealthStatusType::Ok,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatusType::Error,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == HealthStatusType::Ok
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = self.status_code;
        (status_code, Json(self)).into_response()
    }
}
