//! SQLite-backed ledger for chit funds, members, payments and payouts.
//!
//! The database lives at `~/.chitbook/chitbook.db` unless the config names a
//! different path. Payments are an append-only ledger; payables and
//! receivables are projections of it.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags};

pub mod types;
pub use types::*;

pub struct LedgerDb {
    conn: Connection,
}

/// Rolls back an open transaction on drop unless disarmed after `COMMIT`.
/// Covers early returns and panics inside the transaction closure.
struct RollbackGuard<'a> {
    conn: &'a Connection,
    armed: bool,
}

impl RollbackGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(rb) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("Rollback failed: {rb}");
            }
        }
    }
}

impl LedgerDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err or if the closure panics.
    ///
    /// Uses `BEGIN IMMEDIATE` so the write lock is taken before the closure
    /// reads, which serializes concurrent payout attempts across connections.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(DbError::from)?;
        let guard = RollbackGuard {
            conn: &self.conn,
            armed: true,
        };
        let val = f(self)?;
        self.conn.execute_batch("COMMIT").map_err(DbError::from)?;
        guard.disarm();
        Ok(val)
    }

    /// Open (or create) the database at `~/.chitbook/chitbook.db` and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for concurrent readers while one writer holds the lock
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Open a database at an explicit path in read-only mode. Used by the
    /// reporting commands of the binary.
    pub fn open_readonly_at(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.chitbook/chitbook.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".chitbook").join("chitbook.db"))
    }

    /// Highest applied schema migration.
    pub fn schema_version(&self) -> Result<i32, DbError> {
        crate::migrations::current_version(&self.conn).map_err(DbError::Migration)
    }

    /// Number of rows in `table`. Only used with fixed table names.
    #[cfg(test)]
    pub(crate) fn count_rows(&self, table: &str) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), params![], |row| {
                row.get(0)
            })?)
    }
}

/// Read a text column into a `FromStr` enum, surfacing unknown values as a
/// conversion failure instead of a panic.
pub(crate) fn text_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub mod funds;
pub mod groups;
pub mod ledger;
pub mod members;
pub mod payments;
pub mod users;

// =============================================================================
// Shared test utilities
// =============================================================================


// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        for table in [
            "users",
            "chit_funds",
            "fund_members",
            "payments",
            "accounts_payable",
            "accounts_receivable",
            "member_groups",
            "group_members",
        ] {
            assert_eq!(db.count_rows(table).expect(table), 0, "{table} should exist");
        }
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.db");
        {
            let db = LedgerDb::open_at(path.clone()).expect("open");
            seed_user(&db, "u1", Role::Admin);
        }
        let db = LedgerDb::open_at(path).expect("reopen");
        assert_eq!(db.count_rows("users").unwrap(), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            seed_user(tx, "u1", Role::Member);
            Err(DbError::Migration("forced".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(db.count_rows("users").unwrap(), 0);
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            seed_user(tx, "u1", Role::Member);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(db.count_rows("users").unwrap(), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_panic() {
        let db = test_db();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), DbError> = db.with_transaction(|tx| {
                seed_user(tx, "u1", Role::Member);
                panic!("closure panicked mid-transaction");
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(db.count_rows("users").unwrap(), 0);

        // The connection is usable for the next transaction.
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            seed_user(tx, "u2", Role::Member);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(db.count_rows("users").unwrap(), 1);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = test_db();
        let err = db
            .conn_ref()
            .execute(
                "INSERT INTO fund_members (id, fund_id, user_id, joined_at, updated_at)
                 VALUES ('m1', 'missing-fund', 'missing-user', 'now', 'now')",
                [],
            )
            .expect_err("FK violation expected");
        assert!(DbError::from(err).is_constraint_violation());
    }
}
