//! Role checks shared by the workflows.

use kinship_core::error::KinshipError;
use kinship_core::types::{AccessRole, Member, UserId};
use kinship_storage::{access, Connection};
use uuid::Uuid;

/// Require `user` to hold at least `min` on the tree. Returns the held role.
pub(crate) fn require_role(
    conn: &Connection,
    tree_id: Uuid,
    user: UserId,
    min: AccessRole,
    action: &str,
) -> Result<AccessRole, KinshipError> {
    match access::role_of(conn, tree_id, user)? {
        Some(role) if role >= min => Ok(role),
        Some(role) => Err(KinshipError::Unauthorized(format!(
            "{} requires {} on tree {}, user {} holds {}",
            action, min, tree_id, user, role
        ))),
        None => Err(KinshipError::Unauthorized(format!(
            "{} requires {} on tree {}, user {} has no access",
            action, min, tree_id, user
        ))),
    }
}

/// Edit rights over a single member: EDITOR on its tree, or ownership of a
/// member that belongs to no tree.
pub(crate) fn require_member_edit(
    conn: &Connection,
    member: &Member,
    user: UserId,
    action: &str,
) -> Result<(), KinshipError> {
    match member.tree_id {
        Some(tree_id) => require_role(conn, tree_id, user, AccessRole::Editor, action).map(|_| ()),
        None if member.owner_id == user => Ok(()),
        None => Err(KinshipError::Unauthorized(format!(
            "{} requires ownership of member {}",
            action, member.id
        ))),
    }
}
