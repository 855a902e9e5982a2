use std::sync::atomic::{AtomicUsize, Ordering};

/// Lifecycle counters for the ApprovalManager
#[derive(Debug, Default)]
pub(crate) struct ApprovalStats {
    /// Number of requests created
    created: AtomicUsize,
    /// Number of requests approved by a human
    approved: AtomicUsize,
    /// Number of requests denied by a human
    denied: AtomicUsize,
    /// Number of requests that timed out
    expired: AtomicUsize,
}

impl ApprovalStats {
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub(crate) fn approved(&self) -> usize {
        self.approved.load(Ordering::Relaxed)
    }

    pub(crate) fn denied(&self) -> usize {
        self.denied.load(Ordering::Relaxed)
    }

    pub(crate) fn expired(&self) -> usize {
        self.expired.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_approved(&self) {
        self.approved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the manager counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, utoipa::ToSchema)]
pub struct ApprovalStatsSnapshot {
    pub created: usize,
    pub approved: usize,
    pub denied: usize,
    pub expired: usize,
}

impl From<&ApprovalStats> for ApprovalStatsSnapshot {
    fn from(stats: &ApprovalStats) -> Self {
        Self {
            created: stats.created(),
            approved: stats.approved(),
            denied: stats.denied(),
            expired: stats.expired(),
        }
    }
}
