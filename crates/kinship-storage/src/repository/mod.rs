//! Repositories for SQLite-backed persistence.
//!
//! Every function takes a `&Connection`, so the same code runs both on a
//! plain connection (`Database::with_conn`) and inside a unit of work
//! (`Database::with_transaction`, whose `Transaction` derefs to
//! `Connection`).

pub mod access;
pub mod invites;
pub mod members;
pub mod merges;
pub mod relations;
pub mod trees;
pub mod users;

use std::str::FromStr;

use uuid::Uuid;

use kinship_core::error::KinshipError;

/// Map a rusqlite error to a `Database` error with context.
pub(crate) fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> KinshipError {
    move |e| KinshipError::Database(format!("{}: {}", context, e))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, KinshipError> {
    Uuid::parse_str(s).map_err(|e| KinshipError::Database(format!("Invalid UUID {:?}: {}", s, e)))
}

/// Parse a lowercase enum column (relation type, role, status).
pub(crate) fn parse_column<T>(s: &str) -> Result<T, KinshipError>
where
    T: FromStr<Err = String>,
{
    T::from_str(s).map_err(KinshipError::Database)
}
