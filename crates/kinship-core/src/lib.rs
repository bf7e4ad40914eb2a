//! Kinship core: the family-graph model and its pure operations.
//!
//! Holds the data model, error taxonomy and configuration shared by every
//! crate, plus the three side-effect-free components: relation validation,
//! graph views and shared-ancestor matching.

pub mod config;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod relation;
pub mod types;

pub use config::KinshipConfig;
pub use error::{ErrorKind, KinshipError, Result};
pub use graph::{build_layout, build_tree, LayoutSpacing, TreeLayout, TreeView};
pub use matcher::find_shared_ancestors;
pub use relation::is_compatible;
pub use types::*;
