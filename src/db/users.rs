use chrono::Utc;
use rusqlite::params;

use super::*;
use crate::types::{Role, UserStatus};

const USER_COLUMNS: &str = "id, name, email, phone, role, status, created_at, updated_at";

impl LedgerDb {
    // =========================================================================
    // Users
    // =========================================================================

    pub fn insert_user(&self, user: &DbUser) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO users (id, name, email, phone, role, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.name,
                user.email,
                user.phone,
                user.role.as_str(),
                user.status.as_str(),
                user.created_at,
                user.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<DbUser>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], Self::map_user_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Look up a user by email (case-insensitive).
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"
        ))?;
        let mut rows = stmt.query_map(params![email.trim()], Self::map_user_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All users, optionally filtered by role, ordered by name.
    pub fn list_users(&self, role: Option<Role>) -> Result<Vec<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE ?1 IS NULL OR role = ?1
             ORDER BY name COLLATE NOCASE"
        ))?;
        let rows = stmt.query_map(params![role.map(|r| r.as_str())], Self::map_user_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Change a user's role. Returns `false` when no user matched.
    pub fn update_user_role(&self, id: &str, role: Role) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
            params![role.as_str(), now, id],
        )?;
        Ok(rows > 0)
    }

    /// Change a user's status. Returns `false` when no user matched.
    pub fn update_user_status(&self, id: &str, status: UserStatus) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbUser> {
        Ok(DbUser {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            role: text_column(row, 4)?,
            status: text_column(row, 5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}
