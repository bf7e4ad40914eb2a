//! Error types for the family workflows.

use kinship_core::error::{ErrorKind, KinshipError};
use kinship_core::types::{MergeStatus, UserId};
use uuid::Uuid;

/// Errors from the merge workflow.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Merge not found: {0}")]
    NotFound(Uuid),
    #[error("Tree not found: {0}")]
    TreeNotFound(Uuid),
    #[error("User {user} is not allowed to {action}")]
    Unauthorized { user: UserId, action: &'static str },
    #[error("Merge is already {0}")]
    InvalidState(MergeStatus),
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(MergeStatus, MergeStatus),
    #[error("The trees share no ancestors")]
    NoSharedAncestors,
    #[error("A tree cannot be merged into itself")]
    SameTree,
    #[error("Storage error: {0}")]
    Storage(#[from] KinshipError),
}

impl MergeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MergeError::NotFound(_) | MergeError::TreeNotFound(_) => ErrorKind::NotFound,
            MergeError::Unauthorized { .. } => ErrorKind::Unauthorized,
            MergeError::InvalidState(_) | MergeError::InvalidTransition(..) => {
                ErrorKind::InvalidState
            }
            MergeError::NoSharedAncestors | MergeError::SameTree => ErrorKind::Validation,
            MergeError::Storage(e) => e.kind(),
        }
    }
}
