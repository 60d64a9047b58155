//! Hot backup of the ledger database.
//!
//! Uses `rusqlite::backup::Backup` so the source stays open and in use. The
//! default target is `<database>.bak` beside the live file.

use std::path::{Path, PathBuf};

use crate::db::{DbError, LedgerDb};

/// Back up the live database to `<database>.bak`. Returns the backup path.
pub fn backup_database(db: &LedgerDb) -> Result<PathBuf, DbError> {
    let source = db
        .conn_ref()
        .path()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DbError::Migration("cannot back up an in-memory database".to_string()))?;
    let backup_path = PathBuf::from(format!("{source}.bak"));
    backup_database_to(db, &backup_path)?;
    Ok(backup_path)
}

/// Copy every page of the live database into `target`, replacing its contents.
pub fn backup_database_to(db: &LedgerDb, target: &Path) -> Result<(), DbError> {
    let mut backup_conn = rusqlite::Connection::open(target)?;
    let backup = rusqlite::backup::Backup::new(db.conn_ref(), &mut backup_conn)?;

    // Ledgers are small; copy in one step.
    backup.step(-1)?;

    log::info!("Database backed up to {}", target.display());
    Ok(())
}
