//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex. Configures WAL mode and
//! foreign keys on open, runs migrations, and exposes the two ways in:
//! `with_conn` for single statements and `with_transaction` for units of
//! work that must apply all-or-nothing.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use kinship_core::error::KinshipError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Configures WAL mode, synchronous=NORMAL, foreign keys, and runs
    /// all pending migrations.
    pub fn new(path: &Path) -> Result<Self, KinshipError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| KinshipError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| KinshipError::Database(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, KinshipError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| KinshipError::Database(format!("Failed to open in-memory db: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| KinshipError::Database(format!("Failed to set pragmas: {}", e)))?;

        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, KinshipError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, KinshipError> {
        self.conn
            .lock()
            .map_err(|e| KinshipError::Database(format!("Database lock poisoned: {}", e)))
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, KinshipError>
    where
        F: FnOnce(&Connection) -> Result<T, KinshipError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run a closure as one unit of work.
    ///
    /// The transaction takes the write lock immediately. It commits only if
    /// the closure returns `Ok`; any error (including a failed commit) rolls
    /// every statement back. `Transaction` derefs to `Connection`, so the
    /// repository functions work unchanged inside the closure. The closure
    /// may use any error type that storage errors convert into.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<KinshipError> + std::fmt::Display,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| KinshipError::Database(format!("Failed to begin transaction: {}", e)))?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|e| {
                    KinshipError::Database(format!("Failed to commit: {}", e))
                })?;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "Rolling back transaction");
                // Dropping also rolls back; being explicit surfaces rollback errors in logs.
                if let Err(rollback_err) = tx.rollback() {
                    debug!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
