//! Structured replies produced by the dialogue.
//!
//! Front ends decide how to present them; `Display` gives a plain English
//! rendering used by the CLI.

use std::fmt;

use uuid::Uuid;

use kinship_core::error::{ErrorKind, KinshipError};
use kinship_core::types::{AccessRole, Member, RelationType, Tree};
use kinship_render::format_years;

/// One selectable anchor in an [`Reply::AskAnchor`] list.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorChoice {
    pub member_id: Uuid,
    pub full_name: String,
    pub birth_year: Option<i32>,
    pub relation_type: RelationType,
}

impl From<&Member> for AnchorChoice {
    fn from(m: &Member) -> Self {
        Self {
            member_id: m.id,
            full_name: m.full_name.clone(),
            birth_year: m.birth_year,
            relation_type: m.relation_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Welcome { display_name: String },
    Help,
    AskName,
    AskBirthYear { name: String },
    AskRelation { name: String },
    AskAnchor {
        relation: RelationType,
        candidates: Vec<AnchorChoice>,
    },
    MemberAdded { member: Member, anchor: Option<String> },
    Tree { text: String },
    Trees { trees: Vec<(Tree, AccessRole)> },
    Cancelled,
    /// Input was rejected; collected input is kept and the same step is asked
    /// again.
    Retry { kind: ErrorKind, message: String },
    /// The dialogue was abandoned.
    Failed { kind: ErrorKind, message: String },
    UnknownCommand { name: String },
}

impl Reply {
    pub fn retry(err: &KinshipError) -> Self {
        Reply::Retry {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn failed(err: &KinshipError) -> Self {
        Reply::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Welcome { display_name } => {
                if display_name.is_empty() {
                    f.write_str("Welcome!")?;
                } else {
                    write!(f, "Welcome, {}!", display_name)?;
                }
                f.write_str(" Send /add to add a family member or /help for commands.")
            }
            Reply::Help => f.write_str(
                "/add - add a family member\n\
                 /tree - show your family tree\n\
                 /trees - list trees you can access\n\
                 /cancel - abandon the current step",
            ),
            Reply::AskName => f.write_str("What is the person's full name?"),
            Reply::AskBirthYear { name } => {
                write!(f, "Birth year of {}? Send '-' if unknown.", name)
            }
            Reply::AskRelation { name } => write!(
                f,
                "How is {} related? One of: father, mother, sibling, child, spouse.",
                name
            ),
            Reply::AskAnchor {
                relation,
                candidates,
            } => {
                write!(f, "Whose {} is this? Send a number, or '-' for nobody:", relation)?;
                for (i, c) in candidates.iter().enumerate() {
                    let years = format_years(c.birth_year, None);
                    if years.is_empty() {
                        write!(f, "\n  {}. {} ({})", i + 1, c.full_name, c.relation_type)?;
                    } else {
                        write!(
                            f,
                            "\n  {}. {} ({}, {})",
                            i + 1,
                            c.full_name,
                            c.relation_type,
                            years
                        )?;
                    }
                }
                Ok(())
            }
            Reply::MemberAdded { member, anchor } => match anchor {
                Some(anchor) => write!(
                    f,
                    "Added {} as {} of {}.",
                    member.full_name, member.relation_type, anchor
                ),
                None => write!(f, "Added {}.", member.full_name),
            },
            Reply::Tree { text } => f.write_str(text.trim_end()),
            Reply::Trees { trees } => {
                if trees.is_empty() {
                    return f.write_str("You have no trees yet.");
                }
                f.write_str("Your trees:")?;
                for (tree, role) in trees {
                    write!(f, "\n  - {} [{}] {}", tree.name, role, tree.id)?;
                }
                Ok(())
            }
            Reply::Cancelled => f.write_str("Cancelled."),
            Reply::Retry { message, .. } => write!(f, "{}. Please try again.", message),
            Reply::Failed { message, .. } => write!(f, "{}.", message),
            Reply::UnknownCommand { name } => {
                write!(f, "Unknown command /{}. Send /help for the list.", name)
            }
        }
    }
}
