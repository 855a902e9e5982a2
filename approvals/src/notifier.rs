use crate::request::ApprovalRequest;
use log::info;

/// Channel used to alert human approvers.
///
/// Implementations must not block: the manager calls them outside of its
/// store lock but from the caller's task. Delivery failures are the
/// notifier's own concern and never affect the request lifecycle.
pub trait Notifier: Send + Sync {
    /// A new request is waiting for a decision
    fn request_created(&self, request: &ApprovalRequest);

    /// A request reached a terminal state (approved, denied or expired)
    fn request_resolved(&self, request: &ApprovalRequest);
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn request_created(&self, request: &ApprovalRequest) {
        info!(
            "Approval request {} created: '{}' asks for '{}' on '{}' ({})",
            request.id, request.principal, request.action, request.resource, request.justification
        );
    }

    fn request_resolved(&self, request: &ApprovalRequest) {
        info!(
            "Approval request {} is now {} (resolved by {})",
            request.id,
            request.status,
            request.resolved_by.as_deref().unwrap_or("timeout")
        );
    }
}
