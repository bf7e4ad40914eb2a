//! Time-boxed invite tokens granting access to a tree.

use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use kinship_core::config::InviteConfig;
use kinship_core::error::KinshipError;
use kinship_core::types::{AccessRole, Invite, Timestamp, TreeAccess, UserId};
use kinship_storage::{access, invites, trees, users, Database};

use crate::guard::require_role;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

enum Redemption {
    Granted(TreeAccess),
    Expired(Invite),
}

/// Creates and redeems invites.
pub struct InviteService {
    db: Arc<Database>,
    config: InviteConfig,
}

impl InviteService {
    pub fn new(db: Arc<Database>, config: InviteConfig) -> Self {
        Self { db, config }
    }

    /// Mint an invite granting `role` on the tree.
    ///
    /// The creator needs EDITOR, and ADMIN to hand out ADMIN.
    pub fn create_invite(
        &self,
        tree_id: Uuid,
        role: AccessRole,
        creator: UserId,
    ) -> Result<Invite, KinshipError> {
        self.db.with_transaction(|tx| {
            trees::get(tx, tree_id)?.ok_or_else(|| KinshipError::not_found("tree", tree_id))?;
            let min = if role == AccessRole::Admin {
                AccessRole::Admin
            } else {
                AccessRole::Editor
            };
            require_role(tx, tree_id, creator, min, "creating an invite")?;

            let created_at = Timestamp::now();
            let invite = Invite {
                token: generate_token(),
                tree_id,
                role,
                created_by: creator,
                created_at,
                expires_at: created_at.plus_days(self.config.ttl_days),
            };
            invites::insert(tx, &invite)?;
            info!(%tree_id, %role, %creator, "Created invite");
            Ok(invite)
        })
    }

    /// Redeem a token for `user`.
    ///
    /// The invite is consumed either way: a valid one becomes a grant (an
    /// existing higher grant is kept), an expired one is deleted and reported
    /// as `Expired`.
    pub fn redeem(&self, token: &str, user: UserId) -> Result<TreeAccess, KinshipError> {
        let token = token.trim();
        let outcome = self.db.with_transaction(|tx| -> Result<Redemption, KinshipError> {
            let invite = invites::get(tx, token)?
                .ok_or_else(|| KinshipError::not_found("invite", token))?;
            invites::delete(tx, token)?;

            if invite.is_expired_at(Timestamp::now()) {
                return Ok(Redemption::Expired(invite));
            }

            users::upsert(tx, user, "")?;
            let grant = access::grant_at_least(tx, invite.tree_id, user, invite.role)?;
            Ok(Redemption::Granted(grant))
        })?;

        match outcome {
            Redemption::Granted(grant) => {
                info!(tree_id = %grant.tree_id, %user, role = %grant.role, "Invite redeemed");
                Ok(grant)
            }
            Redemption::Expired(invite) => {
                warn!(tree_id = %invite.tree_id, %user, "Expired invite presented");
                Err(KinshipError::Expired(format!(
                    "invite expired at {}",
                    invite.expires_at.to_datetime().to_rfc3339()
                )))
            }
        }
    }

    /// Delete every expired invite. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, KinshipError> {
        self.db
            .with_conn(|conn| invites::delete_expired(conn, Timestamp::now()))
    }
}
