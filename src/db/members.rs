use chrono::Utc;
use rusqlite::params;

use super::*;

const MEMBER_SELECT: &str = "SELECT fm.id, fm.fund_id, fm.user_id, fm.custom_fund_amount,
        fm.increased_monthly_amount, fm.share_identifier, fm.is_withdrawn,
        fm.withdrawal_month, fm.joined_at, fm.updated_at,
        EXISTS (SELECT 1 FROM accounts_payable ap WHERE ap.fund_member_id = fm.id),
        u.name
     FROM fund_members fm
     JOIN users u ON u.id = fm.user_id";

impl LedgerDb {
    // =========================================================================
    // Fund membership
    // =========================================================================

    pub fn insert_fund_member(&self, member: &DbFundMember) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO fund_members (
                id, fund_id, user_id, custom_fund_amount, increased_monthly_amount,
                share_identifier, is_withdrawn, withdrawal_month, joined_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                member.id,
                member.fund_id,
                member.user_id,
                member.custom_fund_amount,
                member.increased_monthly_amount,
                member.share_identifier,
                member.is_withdrawn as i32,
                member.withdrawal_month,
                member.joined_at,
                member.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_fund_member(&self, id: &str) -> Result<Option<DbFundMember>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT} WHERE fm.id = ?1"))?;
        let mut rows = stmt.query_map(params![id], Self::map_member_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_fund_member_by_user(
        &self,
        fund_id: &str,
        user_id: &str,
    ) -> Result<Option<DbFundMember>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT} WHERE fm.fund_id = ?1 AND fm.user_id = ?2"
        ))?;
        let mut rows = stmt.query_map(params![fund_id, user_id], Self::map_member_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Members of a fund ordered by user name.
    pub fn list_fund_members(&self, fund_id: &str) -> Result<Vec<DbFundMember>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT} WHERE fm.fund_id = ?1 ORDER BY u.name COLLATE NOCASE, fm.id"
        ))?;
        let rows = stmt.query_map(params![fund_id], Self::map_member_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every fund membership held by a user.
    pub fn list_memberships_for_user(&self, user_id: &str) -> Result<Vec<DbFundMember>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT} WHERE fm.user_id = ?1 ORDER BY fm.joined_at"
        ))?;
        let rows = stmt.query_map(params![user_id], Self::map_member_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Replace both contribution override columns in one statement.
    ///
    /// Storage rejects rows where both are set.
    pub fn set_contribution_override(
        &self,
        member_id: &str,
        custom_fund_amount: Option<i64>,
        increased_monthly_amount: Option<i64>,
    ) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE fund_members
             SET custom_fund_amount = ?1, increased_monthly_amount = ?2, updated_at = ?3
             WHERE id = ?4",
            params![custom_fund_amount, increased_monthly_amount, now, member_id],
        )?;
        Ok(rows > 0)
    }

    /// Persist the withdrawal flag and month together.
    pub fn set_withdrawal_state(
        &self,
        member_id: &str,
        is_withdrawn: bool,
        withdrawal_month: Option<u32>,
    ) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE fund_members
             SET is_withdrawn = ?1, withdrawal_month = ?2, updated_at = ?3
             WHERE id = ?4",
            params![is_withdrawn as i32, withdrawal_month, now, member_id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn map_member_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbFundMember> {
        Ok(DbFundMember {
            id: row.get(0)?,
            fund_id: row.get(1)?,
            user_id: row.get(2)?,
            custom_fund_amount: row.get(3)?,
            increased_monthly_amount: row.get(4)?,
            share_identifier: row.get(5)?,
            is_withdrawn: row.get::<_, i32>(6)? != 0,
            withdrawal_month: row.get(7)?,
            joined_at: row.get(8)?,
            updated_at: row.get(9)?,
            has_payable: row.get::<_, i32>(10)? != 0,
            user_name: row.get(11)?,
        })
    }
}
