use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const AUTHZ_TAG: &str = "Authorization API";
pub(crate) const APPROVALS_TAG: &str = "Approvals API";

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::health::health_check,
        crate::api::health::ready_check,
        crate::api::health::healthy_check,
        crate::api::authz::check::check_handler,
        crate::api::authz::write::write_handler,
        crate::api::authz::list_objects::list_objects_handler,
        crate::api::approval_requests::create_approval_handler,
        crate::api::approval_requests::list_approvals_handler,
        crate::api::approval_requests::approval_stats_handler,
        crate::api::approval_requests::get_approval_handler,
        crate::api::approval_requests::resolve_approval_handler,
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = AUTHZ_TAG, description = "Permission checks, grants and listings"),
        (name = APPROVALS_TAG, description = "Access escalation workflow"),
    ),
    info(
        title = "Authorization Gate API",
        description = "Permission decisions backed by a remote authorization service",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
