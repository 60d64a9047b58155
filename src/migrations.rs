//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("migrations/001_baseline.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("migrations/002_ledger_projections.sql"),
    },
];

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))
}

/// Return the highest applied migration version, or 0 if none.
pub(crate) fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to read schema version: {}", e))
}

/// Back up the database before applying migrations.
///
/// Uses SQLite's online backup API to create a hot copy at
/// `<db_path>.pre-migration.bak`. Skipped for fresh databases, which have
/// nothing worth keeping.
fn backup_before_migration(conn: &Connection, current: i32) -> Result<(), String> {
    if current == 0 {
        return Ok(());
    }

    let db_path: String = conn
        .query_row("PRAGMA database_list", [], |row| row.get(2))
        .map_err(|e| format!("Failed to get database path: {}", e))?;

    if db_path.is_empty() || db_path == ":memory:" {
        return Ok(());
    }

    let backup_path = format!("{}.pre-migration.bak", db_path);
    let mut backup_conn = Connection::open(&backup_path)
        .map_err(|e| format!("Failed to open backup file: {}", e))?;

    let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)
        .map_err(|e| format!("Failed to initialize pre-migration backup: {}", e))?;

    backup
        .step(-1)
        .map_err(|e| format!("Pre-migration backup failed: {}", e))?;

    log::info!("Pre-migration backup created at {}", backup_path);
    Ok(())
}

/// Apply one migration and record it, atomically.
fn apply(conn: &Connection, migration: &Migration) -> Result<(), String> {
    conn.execute_batch("BEGIN")
        .map_err(|e| format!("Migration v{} could not start: {}", migration.version, e))?;

    let result = conn
        .execute_batch(migration.sql)
        .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))
        .and_then(|_| {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [migration.version],
            )
            .map_err(|e| format!("Failed to record migration v{}: {}", migration.version, e))
        });

    match result {
        Ok(_) => conn
            .execute_batch("COMMIT")
            .map_err(|e| format!("Migration v{} commit failed: {}", migration.version, e)),
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Run all pending migrations.
///
/// Returns the number of migrations applied (0 if already up-to-date).
///
/// Forward-compat guard: if the database has a higher version than the highest
/// known migration, returns an error telling the user to update chitbook.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    if current > max_known {
        return Err(format!(
            "Database schema version ({}) is newer than this version of chitbook supports ({}). \
             Please update chitbook to the latest version.",
            current, max_known
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        return Ok(0);
    }

    backup_before_migration(conn, current)?;

    for migration in &pending {
        apply(conn, migration)?;
        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn test_fresh_db_applies_all() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), 2);

        conn.execute(
            "INSERT INTO users (id, name, email, role, created_at, updated_at)
             VALUES ('u1', 'Asha', 'asha@example.com', 'admin', '2025-01-01', '2025-01-01')",
            [],
        )
        .expect("users table should exist");
        conn.execute(
            "INSERT INTO member_groups (id, name, created_at, updated_at)
             VALUES ('g1', 'Family', '2025-01-01', '2025-01-01')",
            [],
        )
        .expect("member_groups table should exist");
    }

    #[test]
    fn test_idempotency() {
        let conn = mem_db();
        assert_eq!(run_migrations(&conn).expect("first run"), 2);
        assert_eq!(run_migrations(&conn).expect("second run"), 0);
        assert_eq!(current_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_partial_db_applies_only_pending() {
        let conn = mem_db();
        ensure_schema_version_table(&conn).unwrap();
        apply(&conn, &MIGRATIONS[0]).expect("apply v1");

        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 1);
        assert_eq!(current_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_forward_compat_guard() {
        let conn = mem_db();
        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let err = run_migrations(&conn).unwrap_err();
        assert!(
            err.contains("newer than this version"),
            "error should mention version mismatch: {}",
            err
        );
    }

    #[test]
    fn test_pre_migration_backup_created_for_existing_db() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("ledger.db");

        let conn = Connection::open(&db_path).expect("open db");
        ensure_schema_version_table(&conn).unwrap();
        apply(&conn, &MIGRATIONS[0]).expect("apply v1");

        run_migrations(&conn).expect("migrations should succeed");

        let backup_path = dir.path().join("ledger.db.pre-migration.bak");
        assert!(
            backup_path.exists(),
            "pre-migration backup should be created at {}",
            backup_path.display()
        );
    }

    #[test]
    fn test_fresh_db_skips_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("fresh.db");
        let conn = Connection::open(&db_path).expect("open db");

        run_migrations(&conn).expect("migrations should succeed");

        assert!(!dir.path().join("fresh.db.pre-migration.bak").exists());
    }
}
