use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use kinship_core::error::KinshipError;
use kinship_core::types::{AccessRole, Invite, Timestamp, UserId};

use super::{db_err, parse_column, parse_uuid};

pub fn insert(conn: &Connection, invite: &Invite) -> Result<(), KinshipError> {
    conn.execute(
        "INSERT INTO invites (token, tree_id, role, created_by, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            invite.token,
            invite.tree_id.to_string(),
            invite.role.to_string(),
            invite.created_by.0,
            invite.created_at.0,
            invite.expires_at.0,
        ],
    )
    .map_err(db_err("Failed to insert invite"))?;
    Ok(())
}

pub fn get(conn: &Connection, token: &str) -> Result<Option<Invite>, KinshipError> {
    let row = conn
        .query_row(
            "SELECT token, tree_id, role, created_by, created_at, expires_at
             FROM invites WHERE token = ?1",
            params![token],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()
        .map_err(db_err("Failed to load invite"))?;

    let Some((token, tree_id, role, created_by, created_at, expires_at)) = row else {
        return Ok(None);
    };
    Ok(Some(Invite {
        token,
        tree_id: parse_uuid(&tree_id)?,
        role: parse_column::<AccessRole>(&role)?,
        created_by: UserId(created_by),
        created_at: Timestamp(created_at),
        expires_at: Timestamp(expires_at),
    }))
}

pub fn delete(conn: &Connection, token: &str) -> Result<bool, KinshipError> {
    let n = conn
        .execute("DELETE FROM invites WHERE token = ?1", params![token])
        .map_err(db_err("Failed to delete invite"))?;
    Ok(n > 0)
}

pub fn delete_by_tree(conn: &Connection, tree_id: Uuid) -> Result<usize, KinshipError> {
    conn.execute(
        "DELETE FROM invites WHERE tree_id = ?1",
        params![tree_id.to_string()],
    )
    .map_err(db_err("Failed to delete tree invites"))
}

/// Drop every invite whose expiry is at or before `now`.
pub fn delete_expired(conn: &Connection, now: Timestamp) -> Result<usize, KinshipError> {
    conn.execute("DELETE FROM invites WHERE expires_at <= ?1", params![now.0])
        .map_err(db_err("Failed to purge expired invites"))
}
