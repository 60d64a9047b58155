use chrono::Utc;
use rusqlite::params;

use super::*;

impl LedgerDb {
    // =========================================================================
    // Member groups
    // =========================================================================

    pub fn insert_group(&self, group: &DbMemberGroup) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO member_groups (id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group.id,
                group.name,
                group.description,
                group.created_at,
                group.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_group(&self, id: &str) -> Result<Option<DbMemberGroup>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at, updated_at
             FROM member_groups WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_group_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn list_groups(&self) -> Result<Vec<DbMemberGroup>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at, updated_at
             FROM member_groups ORDER BY name",
        )?;
        let rows = stmt.query_map([], Self::map_group_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Insert or replace a user's share in a group.
    pub fn upsert_group_member(
        &self,
        group_id: &str,
        user_id: &str,
        share_bps: u32,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO group_members (group_id, user_id, share_bps, added_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(group_id, user_id) DO UPDATE SET share_bps = excluded.share_bps",
            params![group_id, user_id, share_bps, now],
        )?;
        self.conn.execute(
            "UPDATE member_groups SET updated_at = ?1 WHERE id = ?2",
            params![now, group_id],
        )?;
        Ok(())
    }

    /// Returns `false` when the user was not in the group.
    pub fn remove_group_member(&self, group_id: &str, user_id: &str) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Group members ordered by user name.
    pub fn list_group_members(&self, group_id: &str) -> Result<Vec<DbGroupMember>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT gm.group_id, gm.user_id, u.name, gm.share_bps, gm.added_at
             FROM group_members gm
             JOIN users u ON u.id = gm.user_id
             WHERE gm.group_id = ?1
             ORDER BY u.name COLLATE NOCASE, gm.user_id",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            Ok(DbGroupMember {
                group_id: row.get(0)?,
                user_id: row.get(1)?,
                user_name: row.get(2)?,
                share_bps: row.get(3)?,
                added_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_group_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbMemberGroup> {
        Ok(DbMemberGroup {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}
