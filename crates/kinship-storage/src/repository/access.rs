use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use kinship_core::error::KinshipError;
use kinship_core::types::{AccessRole, Timestamp, TreeAccess, UserId};

use super::{db_err, parse_column, parse_uuid};

/// Set the user's role on a tree, replacing any existing grant.
pub fn grant(
    conn: &Connection,
    tree_id: Uuid,
    user: UserId,
    role: AccessRole,
) -> Result<TreeAccess, KinshipError> {
    let granted_at = Timestamp::now();
    conn.execute(
        "INSERT INTO tree_access (tree_id, user_id, role, granted_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (tree_id, user_id) DO UPDATE SET role = excluded.role,
                                                      granted_at = excluded.granted_at",
        params![tree_id.to_string(), user.0, role.to_string(), granted_at.0],
    )
    .map_err(db_err("Failed to grant access"))?;
    debug!(%tree_id, %user, %role, "Granted tree access");
    Ok(TreeAccess {
        tree_id,
        user_id: user,
        role,
        granted_at,
    })
}

/// Grant `role` unless the user already holds an equal or higher one.
/// Returns the grant in effect afterwards.
pub fn grant_at_least(
    conn: &Connection,
    tree_id: Uuid,
    user: UserId,
    role: AccessRole,
) -> Result<TreeAccess, KinshipError> {
    match get(conn, tree_id, user)? {
        Some(existing) if existing.role >= role => Ok(existing),
        _ => grant(conn, tree_id, user, role),
    }
}

pub fn get(
    conn: &Connection,
    tree_id: Uuid,
    user: UserId,
) -> Result<Option<TreeAccess>, KinshipError> {
    let row = conn
        .query_row(
            "SELECT role, granted_at FROM tree_access WHERE tree_id = ?1 AND user_id = ?2",
            params![tree_id.to_string(), user.0],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()
        .map_err(db_err("Failed to load access"))?;

    match row {
        Some((role, granted_at)) => Ok(Some(TreeAccess {
            tree_id,
            user_id: user,
            role: parse_column(&role)?,
            granted_at: Timestamp(granted_at),
        })),
        None => Ok(None),
    }
}

pub fn role_of(
    conn: &Connection,
    tree_id: Uuid,
    user: UserId,
) -> Result<Option<AccessRole>, KinshipError> {
    Ok(get(conn, tree_id, user)?.map(|a| a.role))
}

pub fn list_for_tree(conn: &Connection, tree_id: Uuid) -> Result<Vec<TreeAccess>, KinshipError> {
    let mut stmt = conn
        .prepare(
            "SELECT tree_id, user_id, role, granted_at FROM tree_access
             WHERE tree_id = ?1 ORDER BY granted_at, rowid",
        )
        .map_err(db_err("Failed to prepare access list"))?;
    let rows = stmt
        .query_map(params![tree_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .map_err(db_err("Failed to list access"))?;

    let mut grants = Vec::new();
    for row in rows {
        let (tree, user, role, granted_at) = row.map_err(db_err("Failed to read access row"))?;
        grants.push(TreeAccess {
            tree_id: parse_uuid(&tree)?,
            user_id: UserId(user),
            role: parse_column(&role)?,
            granted_at: Timestamp(granted_at),
        });
    }
    Ok(grants)
}

/// Copy every grant on `from` to `to`, then drop the grants on `from`.
///
/// A user who already holds a grant on `to` keeps it unchanged. Returns the
/// number of grants added to `to`.
pub fn move_grants(conn: &Connection, from: Uuid, to: Uuid) -> Result<usize, KinshipError> {
    let moved = conn
        .execute(
            "INSERT OR IGNORE INTO tree_access (tree_id, user_id, role, granted_at)
             SELECT ?2, user_id, role, granted_at FROM tree_access WHERE tree_id = ?1",
            params![from.to_string(), to.to_string()],
        )
        .map_err(db_err("Failed to copy access grants"))?;
    conn.execute(
        "DELETE FROM tree_access WHERE tree_id = ?1",
        params![from.to_string()],
    )
    .map_err(db_err("Failed to drop access grants"))?;
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repository::members::tests::seed_tree;
    use crate::repository::users;

    #[test]
    fn test_grant_replaces_role() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let tree_id = seed_tree(conn);
            users::upsert(conn, UserId(2), "guest")?;

            grant(conn, tree_id, UserId(2), AccessRole::Admin)?;
            grant(conn, tree_id, UserId(2), AccessRole::Viewer)?;
            assert_eq!(role_of(conn, tree_id, UserId(2))?, Some(AccessRole::Viewer));
            assert_eq!(list_for_tree(conn, tree_id)?.len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_grant_at_least_keeps_higher_role() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let tree_id = seed_tree(conn);
            users::upsert(conn, UserId(2), "guest")?;

            grant(conn, tree_id, UserId(2), AccessRole::Editor)?;
            let kept = grant_at_least(conn, tree_id, UserId(2), AccessRole::Viewer)?;
            assert_eq!(kept.role, AccessRole::Editor);

            let raised = grant_at_least(conn, tree_id, UserId(2), AccessRole::Admin)?;
            assert_eq!(raised.role, AccessRole::Admin);
            assert_eq!(role_of(conn, tree_id, UserId(2))?, Some(AccessRole::Admin));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_move_grants_target_wins() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let source = seed_tree(conn);
            let target = seed_tree(conn);
            users::upsert(conn, UserId(2), "both")?;
            users::upsert(conn, UserId(3), "source only")?;

            grant(conn, source, UserId(2), AccessRole::Admin)?;
            grant(conn, source, UserId(3), AccessRole::Editor)?;
            grant(conn, target, UserId(2), AccessRole::Viewer)?;

            assert_eq!(move_grants(conn, source, target)?, 1);
            assert_eq!(role_of(conn, target, UserId(2))?, Some(AccessRole::Viewer));
            assert_eq!(role_of(conn, target, UserId(3))?, Some(AccessRole::Editor));
            assert!(list_for_tree(conn, source)?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}
