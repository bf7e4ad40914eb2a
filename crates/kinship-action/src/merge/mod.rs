//! Tree merge workflow.
//!
//! A merge folds a source tree into a target tree. It is requested by an
//! ADMIN of the source tree, only when the two trees share at least one
//! person, and applied when the named approver accepts it. Approval moves
//! every source member, access grant and pending merge reference in a single
//! transaction and deletes the source tree. Identical persons are not
//! collapsed: both copies end up in the target tree.

pub mod state_machine;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use kinship_core::matcher::find_shared_ancestors;
use kinship_core::types::{AccessRole, Member, MergeStatus, Timestamp, TreeMerge, UserId};
use kinship_storage::{access, invites, members, merges, trees, Connection, Database};

use crate::error::MergeError;
use crate::merge::state_machine::validate_transition;

/// What an approved merge changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub merge: TreeMerge,
    pub members_moved: usize,
    pub grants_moved: usize,
    pub invites_dropped: usize,
    /// Other pending merges naming the source tree, now rejected.
    pub merges_rejected: usize,
}

/// Coordinates merge requests between trees.
pub struct MergeCoordinator {
    db: Arc<Database>,
}

impl MergeCoordinator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Request that `source` be merged into `target`.
    ///
    /// Refused when the trees are the same, either is missing, the requester
    /// is not ADMIN of the source, or the trees share nobody.
    pub fn request_merge(
        &self,
        source: Uuid,
        target: Uuid,
        requester: UserId,
        approver: UserId,
    ) -> Result<TreeMerge, MergeError> {
        if source == target {
            return Err(MergeError::SameTree);
        }

        self.db.with_transaction(|tx| {
            require_tree(tx, source)?;
            require_tree(tx, target)?;

            if access::role_of(tx, source, requester)? != Some(AccessRole::Admin) {
                return Err(MergeError::Unauthorized {
                    user: requester,
                    action: "request a merge of this tree",
                });
            }

            let source_members = members::list_by_tree(tx, source)?;
            let target_members = members::list_by_tree(tx, target)?;
            let shared = find_shared_ancestors(&source_members, &target_members);
            if shared.is_empty() {
                return Err(MergeError::NoSharedAncestors);
            }

            let merge = TreeMerge {
                id: Uuid::new_v4(),
                source_tree_id: source,
                target_tree_id: target,
                requester_id: requester,
                approver_id: approver,
                status: MergeStatus::Pending,
                created_at: Timestamp::now(),
                resolved_at: None,
            };
            merges::insert(tx, &merge)?;
            info!(
                merge_id = %merge.id,
                %source,
                %target,
                %requester,
                %approver,
                shared = shared.len(),
                "Merge requested"
            );
            Ok(merge)
        })
    }

    /// Approve a pending merge and apply it.
    ///
    /// Everything happens in one transaction; if any step fails, nothing
    /// moves and the merge stays pending.
    pub fn approve_merge(
        &self,
        merge_id: Uuid,
        approver: UserId,
    ) -> Result<MergeOutcome, MergeError> {
        let result = self.db.with_transaction(|tx| {
            let mut merge = load_for_resolution(tx, merge_id, approver, "approve this merge")?;
            validate_transition(merge.status, MergeStatus::Approved)?;

            let source = merge.source_tree_id;
            let target = merge.target_tree_id;
            require_tree(tx, source)?;
            require_tree(tx, target)?;

            let now = Timestamp::now();
            if !merges::resolve(tx, merge_id, MergeStatus::Approved, now)? {
                return Err(MergeError::InvalidState(merge.status));
            }
            merge.status = MergeStatus::Approved;
            merge.resolved_at = Some(now);

            let members_moved = members::reassign_tree(tx, source, target)?;
            let grants_moved = access::move_grants(tx, source, target)?;
            let invites_dropped = invites::delete_by_tree(tx, source)?;
            let merges_rejected = merges::reject_pending_for_tree(tx, source, merge_id, now)?;
            trees::delete(tx, source)?;

            Ok(MergeOutcome {
                merge,
                members_moved,
                grants_moved,
                invites_dropped,
                merges_rejected,
            })
        });

        match &result {
            Ok(outcome) => info!(
                %merge_id,
                source = %outcome.merge.source_tree_id,
                target = %outcome.merge.target_tree_id,
                members_moved = outcome.members_moved,
                grants_moved = outcome.grants_moved,
                merges_rejected = outcome.merges_rejected,
                "Merge approved"
            ),
            Err(MergeError::Storage(e)) => {
                warn!(%merge_id, error = %e, "Merge approval rolled back")
            }
            Err(_) => {}
        }
        result
    }

    /// Reject a pending merge. No data moves.
    pub fn reject_merge(&self, merge_id: Uuid, approver: UserId) -> Result<TreeMerge, MergeError> {
        self.db.with_transaction(|tx| {
            let mut merge = load_for_resolution(tx, merge_id, approver, "reject this merge")?;
            validate_transition(merge.status, MergeStatus::Rejected)?;

            let now = Timestamp::now();
            if !merges::resolve(tx, merge_id, MergeStatus::Rejected, now)? {
                return Err(MergeError::InvalidState(merge.status));
            }
            merge.status = MergeStatus::Rejected;
            merge.resolved_at = Some(now);
            info!(%merge_id, %approver, "Merge rejected");
            Ok(merge)
        })
    }

    pub fn get(&self, merge_id: Uuid) -> Result<TreeMerge, MergeError> {
        self.db
            .with_conn(|conn| merges::get(conn, merge_id))?
            .ok_or(MergeError::NotFound(merge_id))
    }

    /// Merges waiting for `approver` to decide.
    pub fn pending_for(&self, approver: UserId) -> Result<Vec<TreeMerge>, MergeError> {
        Ok(self
            .db
            .with_conn(|conn| merges::list_pending_for_approver(conn, approver))?)
    }

    /// The people the two stored trees have in common, as
    /// `(source member, target member)` pairs. Both trees are read in one
    /// transaction.
    pub fn shared_ancestors(
        &self,
        source: Uuid,
        target: Uuid,
    ) -> Result<Vec<(Member, Member)>, MergeError> {
        self.db.with_transaction(|conn| {
            require_tree(conn, source)?;
            require_tree(conn, target)?;
            let source_members = members::list_by_tree(conn, source)?;
            let target_members = members::list_by_tree(conn, target)?;
            Ok(find_shared_ancestors(&source_members, &target_members)
                .into_iter()
                .map(|(s, t)| (s.clone(), t.clone()))
                .collect())
        })
    }
}

fn require_tree(conn: &Connection, tree_id: Uuid) -> Result<(), MergeError> {
    match trees::get(conn, tree_id)? {
        Some(_) => Ok(()),
        None => Err(MergeError::TreeNotFound(tree_id)),
    }
}

/// Load a merge and apply the guards shared by approve and reject, in order:
/// existence, approver identity, pending status.
fn load_for_resolution(
    conn: &Connection,
    merge_id: Uuid,
    approver: UserId,
    action: &'static str,
) -> Result<TreeMerge, MergeError> {
    let merge = merges::get(conn, merge_id)?.ok_or(MergeError::NotFound(merge_id))?;
    if merge.approver_id != approver {
        return Err(MergeError::Unauthorized {
            user: approver,
            action,
        });
    }
    if merge.status != MergeStatus::Pending {
        return Err(MergeError::InvalidState(merge.status));
    }
    Ok(merge)
}
