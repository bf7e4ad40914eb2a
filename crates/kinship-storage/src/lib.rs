//! Kinship Storage crate - SQLite persistence for the family graph.
//!
//! Provides a WAL-mode SQLite database with migrations, a unit-of-work
//! transaction helper, and repositories for users, trees, members, the
//! undirected relation edges, tree access grants, invites and merge records.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use rusqlite::{Connection, Transaction};
pub use repository::{access, invites, members, merges, relations, trees, users};
