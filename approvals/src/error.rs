use crate::request::ApprovalStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("Approval request not found: {0}")]
    NotFound(Uuid),

    #[error("Approval request {id} is already {status}")]
    AlreadyResolved { id: Uuid, status: ApprovalStatus },
}
