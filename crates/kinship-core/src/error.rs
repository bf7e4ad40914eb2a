use std::fmt;

use thiserror::Error;

use crate::types::RelationType;

/// Top-level error type for the Kinship system.
///
/// The variants mirror the error taxonomy the messaging layer switches on:
/// each maps to exactly one [`ErrorKind`]. Subsystem crates define their own
/// error types and convert from `KinshipError` so that `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KinshipError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dialogue state error: {0}")]
    State(String),

    #[error("Duplicate relation: {relation_type} '{full_name}' is already linked to this member")]
    DuplicateRelation {
        relation_type: RelationType,
        full_name: String,
    },

    #[error("Invalid relation: a {new} cannot be attached to a {existing}")]
    InvalidRelation {
        new: RelationType,
        existing: RelationType,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KinshipError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        KinshipError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KinshipError::Validation(_) => ErrorKind::Validation,
            KinshipError::State(_) => ErrorKind::State,
            KinshipError::DuplicateRelation { .. } => ErrorKind::DuplicateRelation,
            KinshipError::InvalidRelation { .. } => ErrorKind::InvalidRelation,
            KinshipError::NotFound { .. } => ErrorKind::NotFound,
            KinshipError::Unauthorized(_) => ErrorKind::Unauthorized,
            KinshipError::InvalidState(_) => ErrorKind::InvalidState,
            KinshipError::Database(_) => ErrorKind::Database,
            KinshipError::Expired(_) => ErrorKind::Expired,
            KinshipError::Config(_) => ErrorKind::Config,
            KinshipError::Io(_) | KinshipError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Coarse error classification surfaced to callers.
///
/// The core never formats user-facing messages; it only signals the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    State,
    DuplicateRelation,
    InvalidRelation,
    NotFound,
    Unauthorized,
    InvalidState,
    Database,
    Expired,
    Config,
    Internal,
}

impl ErrorKind {
    /// Whether the user can correct the input and try again without
    /// losing what they entered so far.
    pub fn is_retryable_input(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::DuplicateRelation | ErrorKind::InvalidRelation
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::State => "STATE",
            ErrorKind::DuplicateRelation => "DUPLICATE_RELATION",
            ErrorKind::InvalidRelation => "INVALID_RELATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Database => "DATABASE",
            ErrorKind::Expired => "EXPIRED",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

impl From<toml::de::Error> for KinshipError {
    fn from(err: toml::de::Error) -> Self {
        KinshipError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for KinshipError {
    fn from(err: toml::ser::Error) -> Self {
        KinshipError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for KinshipError {
    fn from(err: serde_json::Error) -> Self {
        KinshipError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Kinship operations.
pub type Result<T> = std::result::Result<T, KinshipError>;
