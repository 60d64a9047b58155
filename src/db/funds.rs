use chrono::Utc;
use rusqlite::params;

use super::*;
use crate::types::FundStatus;

const FUND_COLUMNS: &str = "id, name, amount, duration_months, start_date, end_date, status,
    base_commission, monthly_contribution, monthly_bonus, created_by, created_at, updated_at,
    closed_at";

impl LedgerDb {
    // =========================================================================
    // Chit funds
    // =========================================================================

    pub fn insert_fund(&self, fund: &DbFund) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO chit_funds (
                id, name, amount, duration_months, start_date, end_date, status,
                base_commission, monthly_contribution, monthly_bonus, created_by,
                created_at, updated_at, closed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                fund.id,
                fund.name,
                fund.amount,
                fund.duration_months,
                fund.start_date,
                fund.end_date,
                fund.status.as_str(),
                fund.base_commission,
                fund.monthly_contribution,
                fund.monthly_bonus,
                fund.created_by,
                fund.created_at,
                fund.updated_at,
                fund.closed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_fund(&self, id: &str) -> Result<Option<DbFund>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {FUND_COLUMNS} FROM chit_funds WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], Self::map_fund_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Funds ordered by start date (newest first), optionally filtered by status.
    pub fn list_funds(&self, status: Option<FundStatus>) -> Result<Vec<DbFund>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FUND_COLUMNS} FROM chit_funds
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY start_date DESC, name"
        ))?;
        let rows = stmt.query_map(params![status.map(|s| s.as_str())], Self::map_fund_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Funds the user belongs to.
    pub fn list_funds_for_user(&self, user_id: &str) -> Result<Vec<DbFund>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, f.amount, f.duration_months, f.start_date, f.end_date,
                    f.status, f.base_commission, f.monthly_contribution, f.monthly_bonus,
                    f.created_by, f.created_at, f.updated_at, f.closed_at
             FROM chit_funds f
             JOIN fund_members fm ON fm.fund_id = f.id
             WHERE fm.user_id = ?1
             ORDER BY f.start_date DESC, f.name",
        )?;
        let rows = stmt.query_map(params![user_id], Self::map_fund_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Mark an active fund closed. Returns `false` if the fund was missing or
    /// already closed.
    pub fn close_fund(&self, id: &str) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE chit_funds SET status = 'closed', closed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND status = 'active'",
            params![now, id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn map_fund_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbFund> {
        Ok(DbFund {
            id: row.get(0)?,
            name: row.get(1)?,
            amount: row.get(2)?,
            duration_months: row.get(3)?,
            start_date: row.get(4)?,
            end_date: row.get(5)?,
            status: text_column(row, 6)?,
            base_commission: row.get(7)?,
            monthly_contribution: row.get(8)?,
            monthly_bonus: row.get(9)?,
            created_by: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            closed_at: row.get(13)?,
        })
    }
}
