//! Member and tree workflows.
//!
//! Every mutation runs as one unit of work: the relation check, duplicate
//! check, member insert and edge insert for an attachment either all land
//! or none do.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use kinship_core::config::FamilyConfig;
use kinship_core::error::KinshipError;
use kinship_core::graph::{build_tree, TreeView};
use kinship_core::relation::{check_attachment, validate_fields, validate_new_member};
use kinship_core::types::{
    current_year, AccessRole, Attachment, Member, MemberPatch, MemberWithEdges, NewMember,
    Timestamp, Tree, User, UserId,
};
use kinship_storage::{access, members, relations, trees, users, Connection, Database};

use crate::guard::{require_member_edit, require_role};

/// Stateful entry point for reading and editing family graphs.
pub struct FamilyService {
    db: Arc<Database>,
    config: FamilyConfig,
}

impl FamilyService {
    pub fn new(db: Arc<Database>, config: FamilyConfig) -> Self {
        Self { db, config }
    }

    /// Register the user on first contact, refreshing the display name.
    pub fn ensure_user(&self, user: UserId, display_name: &str) -> Result<User, KinshipError> {
        self.db.with_conn(|conn| users::upsert(conn, user, display_name))
    }

    /// Create a tree owned by `owner`, who receives ADMIN on it.
    pub fn create_tree(
        &self,
        owner: UserId,
        name: &str,
        description: Option<&str>,
    ) -> Result<Tree, KinshipError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KinshipError::Validation("tree name must not be empty".into()));
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        self.db
            .with_transaction(|tx| create_tree_in(tx, owner, name, description))
    }

    /// Trees the user can see, with the role held on each.
    pub fn trees_for_user(&self, user: UserId) -> Result<Vec<(Tree, AccessRole)>, KinshipError> {
        self.db.with_conn(|conn| trees::list_for_user(conn, user))
    }

    /// A tree the user holds at least VIEWER on.
    pub fn tree(&self, user: UserId, tree_id: Uuid) -> Result<Tree, KinshipError> {
        self.db.with_conn(|conn| {
            let tree = trees::get(conn, tree_id)?
                .ok_or_else(|| KinshipError::not_found("tree", tree_id))?;
            require_role(conn, tree_id, user, AccessRole::Viewer, "viewing a tree")?;
            Ok(tree)
        })
    }

    /// Add a member, optionally attached to an existing one.
    ///
    /// With an attachment the member joins the anchor's tree and is linked
    /// to the anchor. Without one it joins the owner's first tree, which is
    /// created on the spot if the owner has none yet.
    pub fn add_member(
        &self,
        owner: UserId,
        input: NewMember,
        attachment: Option<Attachment>,
    ) -> Result<Member, KinshipError> {
        let candidate = self.validate(&input)?;

        match attachment {
            Some(attachment) => self.attach(owner, candidate, attachment),
            None => self.db.with_transaction(|tx| {
                users::upsert(tx, owner, "")?;
                let tree = match trees::first_owned_by(tx, owner)? {
                    Some(tree) => tree,
                    None => {
                        create_tree_in(tx, owner, &self.config.default_tree_name, None)?
                    }
                };
                require_role(tx, tree.id, owner, AccessRole::Editor, "adding a member")?;
                insert_member(tx, owner, candidate, Some(tree.id))
            }),
        }
    }

    /// Add an unattached member to a specific tree.
    pub fn add_member_to_tree(
        &self,
        owner: UserId,
        tree_id: Uuid,
        input: NewMember,
    ) -> Result<Member, KinshipError> {
        let candidate = self.validate(&input)?;
        self.db.with_transaction(|tx| {
            trees::get(tx, tree_id)?.ok_or_else(|| KinshipError::not_found("tree", tree_id))?;
            require_role(tx, tree_id, owner, AccessRole::Editor, "adding a member")?;
            insert_member(tx, owner, candidate, Some(tree_id))
        })
    }

    fn attach(
        &self,
        owner: UserId,
        candidate: NewMember,
        attachment: Attachment,
    ) -> Result<Member, KinshipError> {
        if candidate.relation_type != attachment.role {
            return Err(KinshipError::Validation(format!(
                "member is a {} but is being attached as a {}",
                candidate.relation_type, attachment.role
            )));
        }

        self.db.with_transaction(|tx| {
            let anchor = members::get(tx, attachment.anchor)?
                .ok_or_else(|| KinshipError::not_found("member", attachment.anchor))?;
            require_member_edit(tx, &anchor, owner, "attaching a member")?;

            let neighbors = relations::neighbors(tx, anchor.id)?;
            check_attachment(attachment.role, &anchor, &neighbors, &candidate)?;

            users::upsert(tx, owner, "")?;
            let member = insert_member(tx, owner, candidate, anchor.tree_id)?;
            relations::insert(tx, member.id, anchor.id)?;
            debug!(member_id = %member.id, anchor_id = %anchor.id, role = %attachment.role, "Attached member");
            Ok(member)
        })
    }

    /// Apply a partial update to a member.
    pub fn update_member(
        &self,
        user: UserId,
        member_id: Uuid,
        patch: MemberPatch,
    ) -> Result<Member, KinshipError> {
        self.db.with_transaction(|tx| {
            let mut member = members::get(tx, member_id)?
                .ok_or_else(|| KinshipError::not_found("member", member_id))?;
            require_member_edit(tx, &member, user, "editing a member")?;

            if let Some(name) = patch.full_name {
                member.full_name = name;
            }
            if let Some(birth_year) = patch.birth_year {
                member.birth_year = birth_year;
            }
            if let Some(death_year) = patch.death_year {
                member.death_year = death_year;
            }
            if let Some(is_private) = patch.is_private {
                member.is_private = is_private;
            }
            if let Some(notes) = patch.notes {
                member.notes = notes;
            }

            member.full_name = validate_fields(
                &member.full_name,
                member.birth_year,
                member.death_year,
                self.config.min_birth_year,
                current_year(),
            )?;
            member.updated_at = Timestamp::now();
            members::update(tx, &member)?;
            info!(member_id = %member.id, "Updated member");
            Ok(member)
        })
    }

    /// Delete a member together with all of its edges.
    pub fn remove_member(&self, user: UserId, member_id: Uuid) -> Result<(), KinshipError> {
        self.db.with_transaction(|tx| {
            let member = members::get(tx, member_id)?
                .ok_or_else(|| KinshipError::not_found("member", member_id))?;
            require_member_edit(tx, &member, user, "removing a member")?;
            members::delete(tx, member_id)?;
            info!(member_id = %member_id, tree_id = ?member.tree_id, "Removed member");
            Ok(())
        })
    }

    /// Look up a single member the user can see.
    pub fn member(&self, user: UserId, member_id: Uuid) -> Result<Member, KinshipError> {
        self.db.with_conn(|conn| {
            let member = members::get(conn, member_id)?
                .ok_or_else(|| KinshipError::not_found("member", member_id))?;
            match member.tree_id {
                Some(tree_id) => {
                    let role =
                        require_role(conn, tree_id, user, AccessRole::Viewer, "viewing a member")?;
                    if !visible_to(&member, user, role) {
                        return Err(KinshipError::not_found("member", member_id));
                    }
                }
                None if member.owner_id != user => {
                    return Err(KinshipError::not_found("member", member_id));
                }
                None => {}
            }
            Ok(member)
        })
    }

    /// Members of a tree with their neighbor ids.
    ///
    /// Private members are hidden from viewers other than their owner; the
    /// edges pointing at them are dropped along with them.
    pub fn tree_members(
        &self,
        user: UserId,
        tree_id: Uuid,
    ) -> Result<Vec<MemberWithEdges>, KinshipError> {
        self.db.with_conn(|conn| {
            trees::get(conn, tree_id)?.ok_or_else(|| KinshipError::not_found("tree", tree_id))?;
            let role = require_role(conn, tree_id, user, AccessRole::Viewer, "viewing a tree")?;

            let all = relations::with_edges_by_tree(conn, tree_id)?;
            let hidden: Vec<Uuid> = all
                .iter()
                .filter(|m| !visible_to(&m.member, user, role))
                .map(|m| m.member.id)
                .collect();

            Ok(all
                .into_iter()
                .filter(|m| !hidden.contains(&m.member.id))
                .map(|mut m| {
                    m.neighbors.retain(|id| !hidden.contains(id));
                    m
                })
                .collect())
        })
    }

    /// The flat family view of a tree.
    pub fn view_tree(&self, user: UserId, tree_id: Uuid) -> Result<TreeView, KinshipError> {
        let members = self.tree_members(user, tree_id)?;
        Ok(build_tree(&members))
    }

    fn validate(&self, input: &NewMember) -> Result<NewMember, KinshipError> {
        validate_new_member(input, self.config.min_birth_year, current_year())
    }
}

fn visible_to(member: &Member, user: UserId, role: AccessRole) -> bool {
    !member.is_private || member.owner_id == user || role.can_edit()
}

fn create_tree_in(
    conn: &Connection,
    owner: UserId,
    name: &str,
    description: Option<String>,
) -> Result<Tree, KinshipError> {
    users::upsert(conn, owner, "")?;
    let tree = Tree {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description,
        owner_id: owner,
        created_at: Timestamp::now(),
    };
    trees::insert(conn, &tree)?;
    access::grant(conn, tree.id, owner, AccessRole::Admin)?;
    info!(tree_id = %tree.id, owner = %owner, name = %tree.name, "Created tree");
    Ok(tree)
}

fn insert_member(
    conn: &Connection,
    owner: UserId,
    candidate: NewMember,
    tree_id: Option<Uuid>,
) -> Result<Member, KinshipError> {
    let now = Timestamp::now();
    let member = Member {
        id: Uuid::new_v4(),
        full_name: candidate.full_name,
        birth_year: candidate.birth_year,
        death_year: candidate.death_year,
        relation_type: candidate.relation_type,
        is_private: candidate.is_private,
        owner_id: owner,
        tree_id,
        notes: candidate.notes,
        created_at: now,
        updated_at: now,
    };
    members::insert(conn, &member)?;
    info!(member_id = %member.id, tree_id = ?tree_id, "Added member");
    Ok(member)
}
