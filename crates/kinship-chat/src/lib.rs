//! Conversational interface for Kinship.
//!
//! Assembles member input over several turns, keeps per-user dialogue state
//! in a keyed store, and hands finished input to the family workflows.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod response;

pub use context::{DialogueState, DialogueStore, InMemoryDialogueStore};
pub use error::ChatError;
pub use orchestrator::DialogueOrchestrator;
pub use parser::{parse_input, Input};
pub use response::{AnchorChoice, Reply};
