use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Unix timestamp in seconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    /// This timestamp shifted forward by whole days.
    pub fn plus_days(&self, days: u32) -> Self {
        Self(self.0 + i64::from(days) * 86_400)
    }
}

/// External messenger id of a user (unique per user).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The current calendar year (UTC).
pub fn current_year() -> i32 {
    Utc::now().year()
}

// =============================================================================
// Enums
// =============================================================================

/// A member's role relative to the member it was attached to.
///
/// This is a contextual label, not an absolute position in the graph: a
/// `Father` is the father *of the anchor*, whatever the anchor's own label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Father,
    Mother,
    Sibling,
    Child,
    Spouse,
}

impl RelationType {
    pub const ALL: [RelationType; 5] = [
        RelationType::Father,
        RelationType::Mother,
        RelationType::Sibling,
        RelationType::Child,
        RelationType::Spouse,
    ];

    pub fn is_parent(&self) -> bool {
        matches!(self, RelationType::Father | RelationType::Mother)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Father => "father",
            RelationType::Mother => "mother",
            RelationType::Sibling => "sibling",
            RelationType::Child => "child",
            RelationType::Spouse => "spouse",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "father" => Ok(RelationType::Father),
            "mother" => Ok(RelationType::Mother),
            "sibling" => Ok(RelationType::Sibling),
            "child" => Ok(RelationType::Child),
            "spouse" => Ok(RelationType::Spouse),
            _ => Err(format!("Unknown relation type: {}", s)),
        }
    }
}

/// Role granted to a user over a tree. Ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRole {
    Viewer,
    Editor,
    Admin,
}

impl AccessRole {
    pub fn can_edit(&self) -> bool {
        *self >= AccessRole::Editor
    }
}

impl fmt::Display for AccessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessRole::Viewer => write!(f, "viewer"),
            AccessRole::Editor => write!(f, "editor"),
            AccessRole::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for AccessRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(AccessRole::Viewer),
            "editor" => Ok(AccessRole::Editor),
            "admin" => Ok(AccessRole::Admin),
            _ => Err(format!("Unknown access role: {}", s)),
        }
    }
}

/// Lifecycle of a tree merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStatus::Pending => write!(f, "pending"),
            MergeStatus::Approved => write!(f, "approved"),
            MergeStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for MergeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MergeStatus::Pending),
            "approved" => Ok(MergeStatus::Approved),
            "rejected" => Ok(MergeStatus::Rejected),
            _ => Err(format!("Unknown merge status: {}", s)),
        }
    }
}

// =============================================================================
// Domain Structs
// =============================================================================

/// A person node in a family graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub full_name: String,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub relation_type: RelationType,
    pub is_private: bool,
    pub owner_id: UserId,
    pub tree_id: Option<Uuid>,
    pub notes: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for a member that does not exist yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMember {
    pub full_name: String,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub relation_type: RelationType,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub notes: String,
}

impl NewMember {
    pub fn new(full_name: impl Into<String>, birth_year: Option<i32>, relation_type: RelationType) -> Self {
        Self {
            full_name: full_name.into(),
            birth_year,
            death_year: None,
            relation_type,
            is_private: false,
            notes: String::new(),
        }
    }
}

/// Partial update of a member. `None` leaves a field untouched; the nested
/// options on years allow clearing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberPatch {
    pub full_name: Option<String>,
    pub birth_year: Option<Option<i32>>,
    pub death_year: Option<Option<i32>>,
    pub is_private: Option<bool>,
    pub notes: Option<String>,
}

/// Request to link a new member to an existing one (the anchor).
///
/// `role` is how the new member relates to the anchor. It is compared with
/// the anchor's *stored* `relation_type`, which was itself relative to
/// whatever the anchor was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub role: RelationType,
    pub anchor: Uuid,
}

/// A member together with the ids of its directly connected members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberWithEdges {
    pub member: Member,
    pub neighbors: Vec<Uuid>,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub created_at: Timestamp,
}

/// A named, access-controlled collection of members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: Timestamp,
}

/// A role grant for one user over one tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeAccess {
    pub tree_id: Uuid,
    pub user_id: UserId,
    pub role: AccessRole,
    pub granted_at: Timestamp,
}

/// A request to fold `source_tree_id` into `target_tree_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeMerge {
    pub id: Uuid,
    pub source_tree_id: Uuid,
    pub target_tree_id: Uuid,
    pub requester_id: UserId,
    pub approver_id: UserId,
    pub status: MergeStatus,
    pub created_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

/// A time-boxed capability granting `role` on a tree to whoever redeems it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub token: String,
    pub tree_id: Uuid,
    pub role: AccessRole,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Invite {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_relation_type_round_trip_names() {
        for rt in RelationType::ALL {
            assert_eq!(RelationType::from_str(rt.as_str()).unwrap(), rt);
        }
        assert_eq!(RelationType::from_str("FATHER").unwrap(), RelationType::Father);
        assert!(RelationType::from_str("cousin").is_err());
    }

    #[test]
    fn test_relation_type_serde_snake_case() {
        let json = serde_json::to_string(&RelationType::Spouse).unwrap();
        assert_eq!(json, "\"spouse\"");
    }

    #[test]
    fn test_is_parent() {
        assert!(RelationType::Father.is_parent());
        assert!(RelationType::Mother.is_parent());
        assert!(!RelationType::Child.is_parent());
        assert!(!RelationType::Sibling.is_parent());
        assert!(!RelationType::Spouse.is_parent());
    }

    #[test]
    fn test_access_role_ordering() {
        assert!(AccessRole::Admin > AccessRole::Editor);
        assert!(AccessRole::Editor > AccessRole::Viewer);
        assert!(AccessRole::Admin.can_edit());
        assert!(AccessRole::Editor.can_edit());
        assert!(!AccessRole::Viewer.can_edit());
    }

    #[test]
    fn test_merge_status_parse() {
        assert_eq!(MergeStatus::from_str("pending").unwrap(), MergeStatus::Pending);
        assert_eq!(MergeStatus::Approved.to_string(), "approved");
        assert!(MergeStatus::from_str("PENDING").is_err());
    }

    #[test]
    fn test_timestamp_plus_days() {
        let ts = Timestamp(1_000);
        assert_eq!(ts.plus_days(7).0, 1_000 + 7 * 86_400);
    }

    #[test]
    fn test_invite_expiry_boundary() {
        let invite = Invite {
            token: "t".into(),
            tree_id: Uuid::new_v4(),
            role: AccessRole::Viewer,
            created_by: UserId(1),
            created_at: Timestamp(0),
            expires_at: Timestamp(100),
        };
        assert!(!invite.is_expired_at(Timestamp(99)));
        assert!(invite.is_expired_at(Timestamp(100)));
    }
}
