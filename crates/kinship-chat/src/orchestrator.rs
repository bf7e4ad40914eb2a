//! Dialogue orchestrator: routes messages through the add-member steps.
//!
//! Input is collected one answer per turn (name, birth year, relation,
//! anchor) and kept in the [`DialogueStore`]. Only once everything is known
//! does the orchestrator write the member through [`FamilyService`]. Errors
//! the user can fix leave the collected input in place and ask the same step
//! again.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use kinship_action::FamilyService;
use kinship_core::config::FamilyConfig;
use kinship_core::error::KinshipError;
use kinship_core::relation::validate_fields;
use kinship_core::types::{current_year, Attachment, Member, NewMember, RelationType, UserId};
use kinship_render::text::{render_view, EMPTY_TREE_MESSAGE};

use crate::context::{DialogueState, DialogueStore};
use crate::error::ChatError;
use crate::parser::{parse_choice, parse_input, parse_relation, parse_year, Input};
use crate::response::{AnchorChoice, Reply};

/// Maximum message length in characters.
const MAX_MESSAGE_LENGTH: usize = 500;

pub struct DialogueOrchestrator {
    family: Arc<FamilyService>,
    store: Arc<dyn DialogueStore>,
    min_birth_year: i32,
}

impl DialogueOrchestrator {
    pub fn new(
        family: Arc<FamilyService>,
        store: Arc<dyn DialogueStore>,
        config: &FamilyConfig,
    ) -> Self {
        Self {
            family,
            store,
            min_birth_year: config.min_birth_year,
        }
    }

    /// Handle one message from `user`.
    ///
    /// Workflow failures are reported as [`Reply::Retry`] or
    /// [`Reply::Failed`]; `Err` is reserved for malformed messages and store
    /// failures.
    pub fn handle_message(
        &self,
        user: UserId,
        display_name: &str,
        message: &str,
    ) -> Result<Reply, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }

        let state = self.store.get(user)?;
        debug!(%user, step = state.step(), "Dialogue message");

        match parse_input(message) {
            Input::Command { name, args } => self.handle_command(user, display_name, &name, &args),
            Input::Text(text) => self.handle_text(user, &text, state),
        }
    }

    fn handle_command(
        &self,
        user: UserId,
        display_name: &str,
        name: &str,
        args: &str,
    ) -> Result<Reply, ChatError> {
        match name {
            "start" => {
                self.store.clear(user)?;
                let registered = self.family.ensure_user(user, display_name)?;
                info!(%user, "User started dialogue");
                Ok(Reply::Welcome {
                    display_name: registered.display_name,
                })
            }
            "help" => Ok(Reply::Help),
            "add" => {
                if args.is_empty() {
                    self.store.set(user, DialogueState::AwaitingName)?;
                    Ok(Reply::AskName)
                } else {
                    self.accept_name(user, args)
                }
            }
            "cancel" => {
                self.store.clear(user)?;
                Ok(Reply::Cancelled)
            }
            "tree" => Ok(self.show_tree(user)),
            "trees" => Ok(match self.family.trees_for_user(user) {
                Ok(trees) => Reply::Trees { trees },
                Err(e) => Reply::failed(&e),
            }),
            other => Ok(Reply::UnknownCommand {
                name: other.to_string(),
            }),
        }
    }

    fn handle_text(
        &self,
        user: UserId,
        text: &str,
        state: DialogueState,
    ) -> Result<Reply, ChatError> {
        match state {
            DialogueState::Idle => Ok(Reply::failed(&KinshipError::State(
                "no dialogue in progress; send /add to add a member".into(),
            ))),
            DialogueState::AwaitingName => self.accept_name(user, text),
            DialogueState::AwaitingBirthYear { name } => {
                let birth_year = match parse_year(text).and_then(|year| {
                    validate_fields(&name, year, None, self.min_birth_year, current_year())
                        .map(|_| year)
                }) {
                    Ok(year) => year,
                    Err(e) => return Ok(Reply::retry(&e)),
                };
                self.store.set(
                    user,
                    DialogueState::AwaitingRelation {
                        name: name.clone(),
                        birth_year,
                    },
                )?;
                Ok(Reply::AskRelation { name })
            }
            DialogueState::AwaitingRelation { name, birth_year } => {
                let relation = match parse_relation(text) {
                    Ok(relation) => relation,
                    Err(e) => return Ok(Reply::retry(&e)),
                };
                let (tree_id, candidates) = match self.anchor_candidates(user) {
                    Ok(Some(found)) => found,
                    Ok(None) => return self.finish(user, name, birth_year, relation, None, None),
                    Err(e) => return self.abandon(user, &e),
                };
                if candidates.is_empty() {
                    return self.finish(user, name, birth_year, relation, Some(tree_id), None);
                }
                self.store.set(
                    user,
                    DialogueState::AwaitingAnchor {
                        name,
                        birth_year,
                        relation,
                        tree_id,
                        candidates: candidates.iter().map(|m| m.id).collect(),
                    },
                )?;
                Ok(Reply::AskAnchor {
                    relation,
                    candidates: candidates.iter().map(AnchorChoice::from).collect(),
                })
            }
            DialogueState::AwaitingAnchor {
                name,
                birth_year,
                relation,
                tree_id,
                candidates,
            } => {
                let anchor = match parse_choice(text, candidates.len()) {
                    Ok(choice) => choice.map(|i| candidates[i]),
                    Err(e) => return Ok(Reply::retry(&e)),
                };
                self.finish(user, name, birth_year, relation, Some(tree_id), anchor)
            }
        }
    }

    fn accept_name(&self, user: UserId, text: &str) -> Result<Reply, ChatError> {
        match validate_fields(text, None, None, self.min_birth_year, current_year()) {
            Ok(name) => {
                self.store.set(
                    user,
                    DialogueState::AwaitingBirthYear { name: name.clone() },
                )?;
                Ok(Reply::AskBirthYear { name })
            }
            Err(e) => {
                self.store.set(user, DialogueState::AwaitingName)?;
                Ok(Reply::retry(&e))
            }
        }
    }

    /// Insert the assembled member. Fixable errors keep the dialogue at the
    /// anchor step; anything else ends it.
    ///
    /// Without an anchor the member goes to `tree_id`, the tree the anchors
    /// were offered from. With neither, the user's own tree is used or
    /// created.
    fn finish(
        &self,
        user: UserId,
        name: String,
        birth_year: Option<i32>,
        relation: RelationType,
        tree_id: Option<Uuid>,
        anchor: Option<Uuid>,
    ) -> Result<Reply, ChatError> {
        let input = NewMember::new(name, birth_year, relation);
        let added = match (anchor, tree_id) {
            (Some(anchor), _) => self.family.add_member(
                user,
                input,
                Some(Attachment {
                    role: relation,
                    anchor,
                }),
            ),
            (None, Some(tree_id)) => self.family.add_member_to_tree(user, tree_id, input),
            (None, None) => self.family.add_member(user, input, None),
        };

        match added {
            Ok(member) => {
                self.store.clear(user)?;
                let anchor = anchor
                    .and_then(|id| self.family.member(user, id).ok())
                    .map(|m| m.full_name);
                info!(%user, member_id = %member.id, "Member added via dialogue");
                Ok(Reply::MemberAdded { member, anchor })
            }
            Err(e) if e.kind().is_retryable_input() => {
                debug!(%user, kind = %e.kind(), "Keeping dialogue input after rejection");
                Ok(Reply::retry(&e))
            }
            Err(e) => self.abandon(user, &e),
        }
    }

    fn abandon(&self, user: UserId, err: &KinshipError) -> Result<Reply, ChatError> {
        warn!(%user, kind = %err.kind(), error = %err, "Dialogue abandoned");
        self.store.clear(user)?;
        Ok(Reply::failed(err))
    }

    /// The first tree `user` can edit and its members, in insertion order.
    /// `None` when the user can edit no tree yet.
    fn anchor_candidates(
        &self,
        user: UserId,
    ) -> Result<Option<(Uuid, Vec<Member>)>, KinshipError> {
        let trees = self.family.trees_for_user(user)?;
        let Some((tree, _)) = trees.into_iter().find(|(_, role)| role.can_edit()) else {
            return Ok(None);
        };
        let members = self
            .family
            .tree_members(user, tree.id)?
            .into_iter()
            .map(|m| m.member)
            .collect();
        Ok(Some((tree.id, members)))
    }

    fn show_tree(&self, user: UserId) -> Reply {
        let result = self.family.trees_for_user(user).and_then(|trees| {
            match trees.first() {
                Some((tree, _)) => self.family.view_tree(user, tree.id).map(|v| render_view(&v)),
                None => Ok(format!("{}\n", EMPTY_TREE_MESSAGE)),
            }
        });
        match result {
            Ok(text) => Reply::Tree { text },
            Err(e) => Reply::failed(&e),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
