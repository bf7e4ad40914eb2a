use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use kinship_core::error::KinshipError;
use kinship_core::types::{MergeStatus, Timestamp, TreeMerge, UserId};

use super::{db_err, parse_column, parse_uuid};

const MERGE_COLUMNS: &str = "id, source_tree_id, target_tree_id, requester_id, approver_id, \
     status, created_at, resolved_at";

pub fn insert(conn: &Connection, merge: &TreeMerge) -> Result<(), KinshipError> {
    conn.execute(
        "INSERT INTO tree_merges (id, source_tree_id, target_tree_id, requester_id, approver_id,
                                  status, created_at, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            merge.id.to_string(),
            merge.source_tree_id.to_string(),
            merge.target_tree_id.to_string(),
            merge.requester_id.0,
            merge.approver_id.0,
            merge.status.to_string(),
            merge.created_at.0,
            merge.resolved_at.map(|t| t.0),
        ],
    )
    .map_err(db_err("Failed to insert merge"))?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<TreeMerge>, KinshipError> {
    let sql = format!("SELECT {MERGE_COLUMNS} FROM tree_merges WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], |row| Ok(row_to_merge(row)))
        .optional()
        .map_err(db_err("Failed to load merge"))?;
    row.transpose()
}

/// Move a pending merge to `status`.
///
/// Only a row still in `pending` is touched, so of two concurrent resolvers
/// exactly one sees `true`.
pub fn resolve(
    conn: &Connection,
    id: Uuid,
    status: MergeStatus,
    resolved_at: Timestamp,
) -> Result<bool, KinshipError> {
    let n = conn
        .execute(
            "UPDATE tree_merges SET status = ?2, resolved_at = ?3
             WHERE id = ?1 AND status = 'pending'",
            params![id.to_string(), status.to_string(), resolved_at.0],
        )
        .map_err(db_err("Failed to resolve merge"))?;
    Ok(n > 0)
}

/// Reject every other pending merge that names `tree_id` on either side.
pub fn reject_pending_for_tree(
    conn: &Connection,
    tree_id: Uuid,
    except: Uuid,
    resolved_at: Timestamp,
) -> Result<usize, KinshipError> {
    conn.execute(
        "UPDATE tree_merges SET status = 'rejected', resolved_at = ?3
         WHERE status = 'pending' AND id <> ?2
           AND (source_tree_id = ?1 OR target_tree_id = ?1)",
        params![tree_id.to_string(), except.to_string(), resolved_at.0],
    )
    .map_err(db_err("Failed to reject stale merges"))
}

/// Pending merges awaiting `approver`, oldest first.
pub fn list_pending_for_approver(
    conn: &Connection,
    approver: UserId,
) -> Result<Vec<TreeMerge>, KinshipError> {
    let sql = format!(
        "SELECT {MERGE_COLUMNS} FROM tree_merges
         WHERE approver_id = ?1 AND status = 'pending'
         ORDER BY created_at, rowid"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err("Failed to prepare merge list"))?;
    let rows = stmt
        .query_map(params![approver.0], |row| Ok(row_to_merge(row)))
        .map_err(db_err("Failed to list merges"))?;

    let mut merges = Vec::new();
    for row in rows {
        merges.push(row.map_err(db_err("Failed to read merge row"))??);
    }
    Ok(merges)
}

fn row_to_merge(row: &Row<'_>) -> Result<TreeMerge, KinshipError> {
    let id: String = row.get(0).map_err(db_err("merge.id"))?;
    let source: String = row.get(1).map_err(db_err("merge.source_tree_id"))?;
    let target: String = row.get(2).map_err(db_err("merge.target_tree_id"))?;
    let status: String = row.get(5).map_err(db_err("merge.status"))?;
    let resolved_at: Option<i64> = row.get(7).map_err(db_err("merge.resolved_at"))?;

    Ok(TreeMerge {
        id: parse_uuid(&id)?,
        source_tree_id: parse_uuid(&source)?,
        target_tree_id: parse_uuid(&target)?,
        requester_id: UserId(row.get(3).map_err(db_err("merge.requester_id"))?),
        approver_id: UserId(row.get(4).map_err(db_err("merge.approver_id"))?),
        status: parse_column::<MergeStatus>(&status)?,
        created_at: Timestamp(row.get(6).map_err(db_err("merge.created_at"))?),
        resolved_at: resolved_at.map(Timestamp),
    })
}
