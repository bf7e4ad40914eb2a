use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use kinship_core::error::KinshipError;
use kinship_core::types::{AccessRole, Timestamp, Tree, UserId};

use super::{db_err, parse_column, parse_uuid};

const TREE_COLUMNS: &str = "t.id, t.name, t.description, t.owner_id, t.created_at";

pub fn insert(conn: &Connection, tree: &Tree) -> Result<(), KinshipError> {
    conn.execute(
        "INSERT INTO trees (id, name, description, owner_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            tree.id.to_string(),
            tree.name,
            tree.description,
            tree.owner_id.0,
            tree.created_at.0,
        ],
    )
    .map_err(db_err("Failed to insert tree"))?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Tree>, KinshipError> {
    let sql = format!("SELECT {TREE_COLUMNS} FROM trees t WHERE t.id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], |row| Ok(row_to_tree(row)))
        .optional()
        .map_err(db_err("Failed to load tree"))?;
    row.transpose()
}

/// The oldest tree owned by `owner`, if any.
pub fn first_owned_by(conn: &Connection, owner: UserId) -> Result<Option<Tree>, KinshipError> {
    let sql = format!(
        "SELECT {TREE_COLUMNS} FROM trees t WHERE t.owner_id = ?1
         ORDER BY t.created_at, t.rowid LIMIT 1"
    );
    let row = conn
        .query_row(&sql, params![owner.0], |row| Ok(row_to_tree(row)))
        .optional()
        .map_err(db_err("Failed to load owned tree"))?;
    row.transpose()
}

/// Every tree the user holds a grant on, with the granted role.
pub fn list_for_user(
    conn: &Connection,
    user: UserId,
) -> Result<Vec<(Tree, AccessRole)>, KinshipError> {
    let sql = format!(
        "SELECT {TREE_COLUMNS}, a.role FROM trees t
         JOIN tree_access a ON a.tree_id = t.id
         WHERE a.user_id = ?1
         ORDER BY t.created_at, t.rowid"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err("Failed to prepare tree list"))?;
    let rows = stmt
        .query_map(params![user.0], |row| {
            let role: String = row.get(5)?;
            Ok(row_to_tree(row).and_then(|tree| Ok((tree, parse_column::<AccessRole>(&role)?))))
        })
        .map_err(db_err("Failed to list trees"))?;

    let mut trees = Vec::new();
    for row in rows {
        trees.push(row.map_err(db_err("Failed to read tree row"))??);
    }
    Ok(trees)
}

/// Delete a tree. Returns whether a row was removed.
pub fn delete(conn: &Connection, id: Uuid) -> Result<bool, KinshipError> {
    let n = conn
        .execute("DELETE FROM trees WHERE id = ?1", params![id.to_string()])
        .map_err(db_err("Failed to delete tree"))?;
    Ok(n > 0)
}

fn row_to_tree(row: &Row<'_>) -> Result<Tree, KinshipError> {
    let id: String = row.get(0).map_err(db_err("tree.id"))?;
    Ok(Tree {
        id: parse_uuid(&id)?,
        name: row.get(1).map_err(db_err("tree.name"))?,
        description: row.get(2).map_err(db_err("tree.description"))?,
        owner_id: UserId(row.get(3).map_err(db_err("tree.owner_id"))?),
        created_at: Timestamp(row.get(4).map_err(db_err("tree.created_at"))?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repository::{access, users};

    fn make_tree(owner: UserId, name: &str, created_at: i64) -> Tree {
        Tree {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            owner_id: owner,
            created_at: Timestamp(created_at),
        }
    }

    #[test]
    fn test_insert_get_delete() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            users::upsert(conn, UserId(1), "owner")?;
            let tree = make_tree(UserId(1), "Karimovs", 10);
            insert(conn, &tree)?;

            assert_eq!(get(conn, tree.id)?, Some(tree.clone()));
            assert!(delete(conn, tree.id)?);
            assert!(!delete(conn, tree.id)?);
            assert_eq!(get(conn, tree.id)?, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_first_owned_by_picks_oldest() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            users::upsert(conn, UserId(1), "owner")?;
            let newer = make_tree(UserId(1), "newer", 20);
            let older = make_tree(UserId(1), "older", 10);
            insert(conn, &newer)?;
            insert(conn, &older)?;

            let first = first_owned_by(conn, UserId(1))?.unwrap();
            assert_eq!(first.id, older.id);
            assert!(first_owned_by(conn, UserId(2))?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_list_for_user_uses_grants() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            users::upsert(conn, UserId(1), "owner")?;
            users::upsert(conn, UserId(2), "guest")?;
            let tree = make_tree(UserId(1), "Karimovs", 10);
            insert(conn, &tree)?;
            access::grant(conn, tree.id, UserId(2), AccessRole::Viewer)?;

            let listed = list_for_user(conn, UserId(2))?;
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].1, AccessRole::Viewer);
            assert!(list_for_user(conn, UserId(1))?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}
