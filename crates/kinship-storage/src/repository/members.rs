use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use kinship_core::error::KinshipError;
use kinship_core::types::{Member, RelationType, Timestamp, UserId};

use super::{db_err, parse_column, parse_uuid};

pub(crate) const MEMBER_COLUMNS: &str = "m.id, m.full_name, m.birth_year, m.death_year, \
     m.relation_type, m.is_private, m.owner_id, m.tree_id, m.notes, m.created_at, m.updated_at";

pub fn insert(conn: &Connection, member: &Member) -> Result<(), KinshipError> {
    conn.execute(
        "INSERT INTO members (id, full_name, birth_year, death_year, relation_type, is_private,
                              owner_id, tree_id, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            member.id.to_string(),
            member.full_name,
            member.birth_year,
            member.death_year,
            member.relation_type.as_str(),
            member.is_private as i32,
            member.owner_id.0,
            member.tree_id.map(|id| id.to_string()),
            member.notes,
            member.created_at.0,
            member.updated_at.0,
        ],
    )
    .map_err(db_err("Failed to insert member"))?;
    debug!(member_id = %member.id, tree_id = ?member.tree_id, "Inserted member");
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Member>, KinshipError> {
    let sql = format!("SELECT {MEMBER_COLUMNS} FROM members m WHERE m.id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], |row| Ok(row_to_member(row)))
        .optional()
        .map_err(db_err("Failed to load member"))?;
    row.transpose()
}

/// Overwrite the mutable fields of a stored member.
pub fn update(conn: &Connection, member: &Member) -> Result<(), KinshipError> {
    let n = conn
        .execute(
            "UPDATE members SET full_name = ?2, birth_year = ?3, death_year = ?4,
                    is_private = ?5, notes = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                member.id.to_string(),
                member.full_name,
                member.birth_year,
                member.death_year,
                member.is_private as i32,
                member.notes,
                member.updated_at.0,
            ],
        )
        .map_err(db_err("Failed to update member"))?;
    if n == 0 {
        return Err(KinshipError::not_found("member", member.id));
    }
    Ok(())
}

/// Delete a member; its edges go with it. Returns whether a row was removed.
pub fn delete(conn: &Connection, id: Uuid) -> Result<bool, KinshipError> {
    let n = conn
        .execute("DELETE FROM members WHERE id = ?1", params![id.to_string()])
        .map_err(db_err("Failed to delete member"))?;
    Ok(n > 0)
}

/// Members of a tree in insertion order.
pub fn list_by_tree(conn: &Connection, tree_id: Uuid) -> Result<Vec<Member>, KinshipError> {
    let sql = format!(
        "SELECT {MEMBER_COLUMNS} FROM members m WHERE m.tree_id = ?1
         ORDER BY m.created_at, m.rowid"
    );
    collect(conn, &sql, params![tree_id.to_string()])
}

/// Move every member of `from` into `to`. Returns the number moved.
pub fn reassign_tree(conn: &Connection, from: Uuid, to: Uuid) -> Result<usize, KinshipError> {
    conn.execute(
        "UPDATE members SET tree_id = ?2, updated_at = ?3 WHERE tree_id = ?1",
        params![from.to_string(), to.to_string(), Timestamp::now().0],
    )
    .map_err(db_err("Failed to reassign members"))
}

pub(crate) fn collect(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Member>, KinshipError> {
    let mut stmt = conn.prepare(sql).map_err(db_err("Failed to prepare member query"))?;
    let rows = stmt
        .query_map(params, |row| Ok(row_to_member(row)))
        .map_err(db_err("Failed to query members"))?;

    let mut members = Vec::new();
    for row in rows {
        members.push(row.map_err(db_err("Failed to read member row"))??);
    }
    Ok(members)
}

pub(crate) fn row_to_member(row: &Row<'_>) -> Result<Member, KinshipError> {
    let id: String = row.get(0).map_err(db_err("member.id"))?;
    let relation_type: String = row.get(4).map_err(db_err("member.relation_type"))?;
    let is_private: i32 = row.get(5).map_err(db_err("member.is_private"))?;
    let tree_id: Option<String> = row.get(7).map_err(db_err("member.tree_id"))?;

    Ok(Member {
        id: parse_uuid(&id)?,
        full_name: row.get(1).map_err(db_err("member.full_name"))?,
        birth_year: row.get(2).map_err(db_err("member.birth_year"))?,
        death_year: row.get(3).map_err(db_err("member.death_year"))?,
        relation_type: parse_column::<RelationType>(&relation_type)?,
        is_private: is_private != 0,
        owner_id: UserId(row.get(6).map_err(db_err("member.owner_id"))?),
        tree_id: tree_id.as_deref().map(parse_uuid).transpose()?,
        notes: row.get(8).map_err(db_err("member.notes"))?,
        created_at: Timestamp(row.get(9).map_err(db_err("member.created_at"))?),
        updated_at: Timestamp(row.get(10).map_err(db_err("member.updated_at"))?),
    })
}
