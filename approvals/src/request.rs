use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl ApprovalStatus {
    /// Whether the status is terminal (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Only an explicit approval grants access. Expired counts as denied.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Outcome supplied by a human approver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Approved,
    Denied,
}

impl From<Resolution> for ApprovalStatus {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Approved => ApprovalStatus::Approved,
            Resolution::Denied => ApprovalStatus::Denied,
        }
    }
}

/// An escalated access request awaiting (or having received) a human decision.
///
/// Field names are camelCase on the wire for dashboard and audit consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: Uuid,
    /// Principal asking for access
    pub principal: String,
    /// Relation the principal asked to hold on the resource
    pub action: String,
    pub resource: String,
    pub justification: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    /// Deadline after which the request expires if still pending
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

/// Input for a new approval request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewApprovalRequest {
    pub principal: String,
    pub action: String,
    pub resource: String,
    pub justification: String,
}
