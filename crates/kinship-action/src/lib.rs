//! Family workflows for Kinship.
//!
//! Stateful operations over the store: adding, editing and viewing members,
//! merging trees that share ancestors, and inviting other users.

pub mod error;
pub mod family;
mod guard;
pub mod invite;
pub mod merge;

pub use error::MergeError;
pub use family::FamilyService;
pub use invite::{generate_token, InviteService};
pub use merge::{MergeCoordinator, MergeOutcome};
