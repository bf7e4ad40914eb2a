//! The undirected member-to-member edge table.
//!
//! Each edge is stored once as `(member_low, member_high)`. "related to" and
//! "related from" are the two directions of observation; `neighbors` is
//! their union.

use std::collections::HashMap;

use rusqlite::{params, Connection};
use uuid::Uuid;

use kinship_core::error::KinshipError;
use kinship_core::types::{Member, MemberWithEdges};

use super::members::{self, MEMBER_COLUMNS};
use super::{db_err, parse_uuid};

/// Normalise a pair into stored order. Compared as text, the way SQLite
/// compares the columns.
fn ordered(a: Uuid, b: Uuid) -> (String, String) {
    let (a, b) = (a.to_string(), b.to_string());
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Link two members. Returns `false` if the edge already existed.
pub fn insert(conn: &Connection, a: Uuid, b: Uuid) -> Result<bool, KinshipError> {
    if a == b {
        return Err(KinshipError::Validation(
            "a member cannot be related to itself".into(),
        ));
    }
    let (low, high) = ordered(a, b);
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO relations (member_low, member_high) VALUES (?1, ?2)",
            params![low, high],
        )
        .map_err(db_err("Failed to insert relation"))?;
    Ok(n > 0)
}

/// Members directly linked to `id`, in either direction.
pub fn neighbors(conn: &Connection, id: Uuid) -> Result<Vec<Member>, KinshipError> {
    let sql = format!(
        "SELECT {MEMBER_COLUMNS} FROM members m
         JOIN relations r ON (r.member_low = ?1 AND m.id = r.member_high)
                          OR (r.member_high = ?1 AND m.id = r.member_low)
         ORDER BY m.created_at, m.rowid"
    );
    members::collect(conn, &sql, params![id.to_string()])
}

/// Every member of the tree with the ids of its neighbors.
///
/// Neighbor lists follow edge insertion order. An edge reaching outside the
/// tree is kept; downstream builders ignore ids they were not given.
pub fn with_edges_by_tree(
    conn: &Connection,
    tree_id: Uuid,
) -> Result<Vec<MemberWithEdges>, KinshipError> {
    let members = members::list_by_tree(conn, tree_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT r.member_low, r.member_high FROM relations r
             WHERE r.member_low IN (SELECT id FROM members WHERE tree_id = ?1)
                OR r.member_high IN (SELECT id FROM members WHERE tree_id = ?1)
             ORDER BY r.created_at, r.rowid",
        )
        .map_err(db_err("Failed to prepare edge query"))?;
    let rows = stmt
        .query_map(params![tree_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(db_err("Failed to query edges"))?;

    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in rows {
        let (low, high) = row.map_err(db_err("Failed to read edge row"))?;
        let (low, high) = (parse_uuid(&low)?, parse_uuid(&high)?);
        adjacency.entry(low).or_default().push(high);
        adjacency.entry(high).or_default().push(low);
    }

    Ok(members
        .into_iter()
        .map(|member| {
            let neighbors = adjacency.remove(&member.id).unwrap_or_default();
            MemberWithEdges { member, neighbors }
        })
        .collect())
}
