use chrono::{NaiveDate, Utc};
use rusqlite::params;

use super::*;

const PAYABLE_COLUMNS: &str = "id, fund_member_id, fund_id, user_id, amount, commission, bonus,
    penalty, withdrawal_month, status, created_by, created_at, paid_at";

const RECEIVABLE_COLUMNS: &str =
    "id, payment_id, fund_id, user_id, amount, month_number, received_date, created_at";

impl LedgerDb {
    // =========================================================================
    // Accounts payable
    // =========================================================================

    /// Insert a payable. The unique index on `fund_member_id` rejects a
    /// second payable for the same member.
    pub fn insert_payable(&self, payable: &DbPayable) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO accounts_payable (
                id, fund_member_id, fund_id, user_id, amount, commission, bonus, penalty,
                withdrawal_month, status, created_by, created_at, paid_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                payable.id,
                payable.fund_member_id,
                payable.fund_id,
                payable.user_id,
                payable.amount,
                payable.commission,
                payable.bonus,
                payable.penalty,
                payable.withdrawal_month,
                payable.status.as_str(),
                payable.created_by,
                payable.created_at,
                payable.paid_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_payable(&self, id: &str) -> Result<Option<DbPayable>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYABLE_COLUMNS} FROM accounts_payable WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_payable_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_payable_for_member(&self, member_id: &str) -> Result<Option<DbPayable>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYABLE_COLUMNS} FROM accounts_payable WHERE fund_member_id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![member_id], Self::map_payable_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Payables, newest first, optionally limited to one fund.
    pub fn list_payables(&self, fund_id: Option<&str>) -> Result<Vec<DbPayable>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYABLE_COLUMNS} FROM accounts_payable
             WHERE ?1 IS NULL OR fund_id = ?1
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![fund_id], Self::map_payable_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Move a pending payable to paid. Returns `false` if it was missing or
    /// already paid.
    pub fn mark_payable_paid(&self, id: &str) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE accounts_payable SET status = 'paid', paid_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![now, id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn map_payable_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbPayable> {
        Ok(DbPayable {
            id: row.get(0)?,
            fund_member_id: row.get(1)?,
            fund_id: row.get(2)?,
            user_id: row.get(3)?,
            amount: row.get(4)?,
            commission: row.get(5)?,
            bonus: row.get(6)?,
            penalty: row.get(7)?,
            withdrawal_month: row.get(8)?,
            status: text_column(row, 9)?,
            created_by: row.get(10)?,
            created_at: row.get(11)?,
            paid_at: row.get(12)?,
        })
    }

    // =========================================================================
    // Accounts receivable
    // =========================================================================

    /// Materialize one receivable per payment that lacks one.
    ///
    /// Receivable ids derive from the payment id, so repeated syncs are
    /// idempotent. Returns the number of receivables inserted.
    pub fn sync_receivables(&self) -> Result<usize, DbError> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO accounts_receivable (
                id, payment_id, fund_id, user_id, amount, month_number, received_date, created_at
             )
             SELECT 'rcv-' || p.id, p.id, p.fund_id, p.user_id, p.amount, p.month_number,
                    p.payment_date, ?1
             FROM payments p
             WHERE NOT EXISTS (
                SELECT 1 FROM accounts_receivable ar WHERE ar.payment_id = p.id
             )",
            params![now],
        )?;
        Ok(inserted)
    }

    pub fn list_receivables(&self, fund_id: Option<&str>) -> Result<Vec<DbReceivable>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM accounts_receivable
             WHERE ?1 IS NULL OR fund_id = ?1
             ORDER BY received_date, id"
        ))?;
        let rows = stmt.query_map(params![fund_id], |row| {
            Ok(DbReceivable {
                id: row.get(0)?,
                payment_id: row.get(1)?,
                fund_id: row.get(2)?,
                user_id: row.get(3)?,
                amount: row.get(4)?,
                month_number: row.get(5)?,
                received_date: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Payables created within `[from, to]` (by the date part of `created_at`).
    pub fn list_payables_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DbPayable>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYABLE_COLUMNS} FROM accounts_payable
             WHERE substr(created_at, 1, 10) >= ?1 AND substr(created_at, 1, 10) <= ?2
             ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![from, to], Self::map_payable_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
