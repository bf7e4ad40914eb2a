//! Error types for the dialogue layer.

use kinship_core::error::{ErrorKind, KinshipError};

/// Errors from the dialogue engine itself.
///
/// Workflow failures (a rejected birth year, a duplicate relation) are not
/// errors here: they come back as replies so the user can try again.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("dialogue store error: {0}")]
    Store(String),
    #[error(transparent)]
    Kinship(#[from] KinshipError),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => ErrorKind::Validation,
            ChatError::Store(_) => ErrorKind::State,
            ChatError::Kinship(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(500).to_string(),
            "message exceeds maximum length of 500 characters"
        );
        assert_eq!(
            ChatError::Store("lock poisoned".into()).to_string(),
            "dialogue store error: lock poisoned"
        );
    }

    #[test]
    fn test_kinship_error_passes_through() {
        let err: ChatError = KinshipError::not_found("tree", "t1").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "tree not found: t1");
    }
}
