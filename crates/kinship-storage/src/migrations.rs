//! Database schema migrations.
//!
//! Applies the initial schema: users, trees, members, the undirected
//! relations edge table, tree_access, invites, tree_merges and the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use kinship_core::error::KinshipError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), KinshipError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| KinshipError::Database(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| KinshipError::Database(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// Relations hold each undirected edge once as `(member_low, member_high)`
/// with `member_low < member_high`, so the primary key alone rejects both a
/// repeated edge and its mirror image. Merge records carry no foreign keys:
/// an approved merge outlives the source tree it names.
fn apply_v1(conn: &Connection) -> Result<(), KinshipError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            telegram_id     INTEGER PRIMARY KEY NOT NULL,
            display_name    TEXT NOT NULL DEFAULT '',
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS trees (
            id              TEXT PRIMARY KEY NOT NULL,
            name            TEXT NOT NULL,
            description     TEXT,
            owner_id        INTEGER NOT NULL REFERENCES users(telegram_id),
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_trees_owner
            ON trees (owner_id, created_at);

        CREATE TABLE IF NOT EXISTS members (
            id              TEXT PRIMARY KEY NOT NULL,
            full_name       TEXT NOT NULL CHECK (length(full_name) > 0),
            birth_year      INTEGER,
            death_year      INTEGER,
            relation_type   TEXT NOT NULL
                            CHECK (relation_type IN ('father', 'mother', 'sibling', 'child', 'spouse')),
            is_private      INTEGER NOT NULL DEFAULT 0,
            owner_id        INTEGER NOT NULL REFERENCES users(telegram_id),
            tree_id         TEXT REFERENCES trees(id) ON DELETE SET NULL,
            notes           TEXT NOT NULL DEFAULT '',
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL,
            CHECK (death_year IS NULL OR birth_year IS NULL OR death_year >= birth_year)
        );

        CREATE INDEX IF NOT EXISTS idx_members_tree
            ON members (tree_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_members_owner
            ON members (owner_id);

        CREATE INDEX IF NOT EXISTS idx_members_identity
            ON members (full_name, birth_year);

        CREATE TABLE IF NOT EXISTS relations (
            member_low      TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            member_high     TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (member_low, member_high),
            CHECK (member_low < member_high)
        );

        CREATE INDEX IF NOT EXISTS idx_relations_high
            ON relations (member_high);

        CREATE TABLE IF NOT EXISTS tree_access (
            tree_id         TEXT NOT NULL REFERENCES trees(id) ON DELETE CASCADE,
            user_id         INTEGER NOT NULL REFERENCES users(telegram_id),
            role            TEXT NOT NULL CHECK (role IN ('viewer', 'editor', 'admin')),
            granted_at      INTEGER NOT NULL,
            UNIQUE (tree_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_tree_access_user
            ON tree_access (user_id);

        CREATE TABLE IF NOT EXISTS invites (
            token           TEXT PRIMARY KEY NOT NULL,
            tree_id         TEXT NOT NULL REFERENCES trees(id) ON DELETE CASCADE,
            role            TEXT NOT NULL CHECK (role IN ('viewer', 'editor', 'admin')),
            created_by      INTEGER NOT NULL REFERENCES users(telegram_id),
            created_at      INTEGER NOT NULL,
            expires_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tree_merges (
            id              TEXT PRIMARY KEY NOT NULL,
            source_tree_id  TEXT NOT NULL,
            target_tree_id  TEXT NOT NULL,
            requester_id    INTEGER NOT NULL,
            approver_id     INTEGER NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'approved', 'rejected')),
            created_at      INTEGER NOT NULL,
            resolved_at     INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_tree_merges_status
            ON tree_merges (status, created_at);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| KinshipError::Database(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (telegram_id, display_name) VALUES (1, 'owner')",
            [],
        )
        .unwrap();
        conn
    }

    fn insert_member(conn: &Connection, id: &str) {
        conn.execute(
            "INSERT INTO members (id, full_name, relation_type, owner_id, created_at, updated_at)
             VALUES (?1, 'Name', 'father', 1, 0, 0)",
            [id],
        )
        .unwrap();
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();

        // Running again should be idempotent.
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_relation_type_check() {
        let conn = open_test_conn();
        let result = conn.execute(
            "INSERT INTO members (id, full_name, relation_type, owner_id, created_at, updated_at)
             VALUES ('m', 'Name', 'cousin', 1, 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_member_death_before_birth_rejected() {
        let conn = open_test_conn();
        let result = conn.execute(
            "INSERT INTO members (id, full_name, birth_year, death_year, relation_type, owner_id, created_at, updated_at)
             VALUES ('m', 'Name', 1950, 1940, 'father', 1, 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_relations_require_ordered_pair() {
        let conn = open_test_conn();
        insert_member(&conn, "a");
        insert_member(&conn, "b");

        assert!(conn
            .execute("INSERT INTO relations (member_low, member_high) VALUES ('b', 'a')", [])
            .is_err());
        assert!(conn
            .execute("INSERT INTO relations (member_low, member_high) VALUES ('a', 'a')", [])
            .is_err());

        conn.execute("INSERT INTO relations (member_low, member_high) VALUES ('a', 'b')", [])
            .unwrap();
        assert!(conn
            .execute("INSERT INTO relations (member_low, member_high) VALUES ('a', 'b')", [])
            .is_err());
    }

    #[test]
    fn test_relations_cascade_on_member_delete() {
        let conn = open_test_conn();
        insert_member(&conn, "a");
        insert_member(&conn, "b");
        conn.execute("INSERT INTO relations (member_low, member_high) VALUES ('a', 'b')", [])
            .unwrap();

        conn.execute("DELETE FROM members WHERE id = 'b'", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_tree_access_unique_per_user() {
        let conn = open_test_conn();
        conn.execute(
            "INSERT INTO trees (id, name, owner_id, created_at) VALUES ('t', 'T', 1, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tree_access (tree_id, user_id, role, granted_at) VALUES ('t', 1, 'admin', 0)",
            [],
        )
        .unwrap();
        assert!(conn
            .execute(
                "INSERT INTO tree_access (tree_id, user_id, role, granted_at) VALUES ('t', 1, 'viewer', 0)",
                [],
            )
            .is_err());
    }

    #[test]
    fn test_merges_survive_tree_delete() {
        let conn = open_test_conn();
        conn.execute(
            "INSERT INTO trees (id, name, owner_id, created_at) VALUES ('t', 'T', 1, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tree_merges (id, source_tree_id, target_tree_id, requester_id, approver_id, created_at)
             VALUES ('m', 't', 'other', 1, 1, 0)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM trees WHERE id = 't'", []).unwrap();

        let status: String = conn
            .query_row("SELECT status FROM tree_merges WHERE id = 'm'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "pending");
    }
}
