use rusqlite::{params, Connection, OptionalExtension};

use kinship_core::error::KinshipError;
use kinship_core::types::{Timestamp, User, UserId};

use super::db_err;

/// Insert the user if unknown, refresh the display name otherwise.
///
/// An empty `display_name` never overwrites a stored one.
pub fn upsert(conn: &Connection, id: UserId, display_name: &str) -> Result<User, KinshipError> {
    conn.execute(
        "INSERT INTO users (telegram_id, display_name, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (telegram_id) DO UPDATE SET display_name = excluded.display_name
         WHERE excluded.display_name <> ''",
        params![id.0, display_name, Timestamp::now().0],
    )
    .map_err(db_err("Failed to upsert user"))?;

    get(conn, id)?.ok_or_else(|| KinshipError::not_found("user", id))
}

pub fn get(conn: &Connection, id: UserId) -> Result<Option<User>, KinshipError> {
    conn.query_row(
        "SELECT telegram_id, display_name, created_at FROM users WHERE telegram_id = ?1",
        params![id.0],
        |row| {
            Ok(User {
                id: UserId(row.get(0)?),
                display_name: row.get(1)?,
                created_at: Timestamp(row.get(2)?),
            })
        },
    )
    .optional()
    .map_err(db_err("Failed to load user"))
}
