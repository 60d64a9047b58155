use chrono::NaiveDate;
use rusqlite::params;

use super::*;
use crate::types::PaymentType;

const PAYMENT_COLUMNS: &str = "id, fund_member_id, fund_id, user_id, amount, payment_date,
    payment_type, month_number, payment_method, recorded_by, notes, created_at";

impl LedgerDb {
    // =========================================================================
    // Payment ledger (append-only)
    // =========================================================================

    pub fn insert_payment(&self, payment: &DbPayment) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO payments (
                id, fund_member_id, fund_id, user_id, amount, payment_date, payment_type,
                month_number, payment_method, recorded_by, notes, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                payment.id,
                payment.fund_member_id,
                payment.fund_id,
                payment.user_id,
                payment.amount,
                payment.payment_date,
                payment.payment_type.as_str(),
                payment.month_number,
                payment.payment_method.as_str(),
                payment.recorded_by,
                payment.notes,
                payment.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_payment(&self, id: &str) -> Result<Option<DbPayment>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], Self::map_payment_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// A member's payments ordered by month, then date, then insertion time.
    pub fn list_member_payments(&self, member_id: &str) -> Result<Vec<DbPayment>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE fund_member_id = ?1
             ORDER BY month_number, payment_date, created_at"
        ))?;
        let rows = stmt.query_map(params![member_id], Self::map_payment_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_fund_payments(&self, fund_id: &str) -> Result<Vec<DbPayment>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE fund_id = ?1
             ORDER BY payment_date, created_at"
        ))?;
        let rows = stmt.query_map(params![fund_id], Self::map_payment_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Payments dated within `[from, to]`, inclusive.
    pub fn list_payments_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DbPayment>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE payment_date >= ?1 AND payment_date <= ?2
             ORDER BY payment_date, created_at"
        ))?;
        let rows = stmt.query_map(params![from, to], Self::map_payment_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Months paid and amount paid for a member, counting monthly payments only.
    ///
    /// Months are deduplicated by month number: two payments recorded for the
    /// same month count once toward `months_paid` but both add to `paid_amount`.
    pub fn member_contribution_totals(
        &self,
        member_id: &str,
    ) -> Result<ContributionTotals, DbError> {
        let paid_amount: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM payments
             WHERE fund_member_id = ?1 AND payment_type = ?2",
            params![member_id, PaymentType::Monthly.as_str()],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT month_number FROM payments
             WHERE fund_member_id = ?1 AND payment_type = ?2
             ORDER BY month_number",
        )?;
        let unique_months = stmt
            .query_map(params![member_id, PaymentType::Monthly.as_str()], |row| {
                row.get::<_, u32>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ContributionTotals {
            months_paid: unique_months.len() as u32,
            paid_amount,
            unique_months,
        })
    }

    pub(crate) fn map_payment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbPayment> {
        Ok(DbPayment {
            id: row.get(0)?,
            fund_member_id: row.get(1)?,
            fund_id: row.get(2)?,
            user_id: row.get(3)?,
            amount: row.get(4)?,
            payment_date: row.get(5)?,
            payment_type: text_column(row, 6)?,
            month_number: row.get(7)?,
            payment_method: text_column(row, 8)?,
            recorded_by: row.get(9)?,
            notes: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::types::{PaymentMethod, Role};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn setup() -> (LedgerDb, DbFundMember) {
        let db = test_db();
        seed_fund(&db, "f1", 100_000);
        seed_user(&db, "u1", Role::Member);
        let member = seed_member(&db, "m1", "f1", "u1");
        (db, member)
    }

    #[test]
    fn test_totals_dedup_by_month_number() {
        let (db, member) = setup();
        seed_payment(&db, "p1", &member, 1, 5_000, date(1, 5));
        seed_payment(&db, "p2", &member, 2, 3_000, date(2, 5));
        seed_payment(&db, "p3", &member, 2, 2_000, date(2, 20));

        let totals = db.member_contribution_totals("m1").unwrap();
        assert_eq!(totals.months_paid, 2);
        assert_eq!(totals.paid_amount, 10_000);
        assert_eq!(totals.unique_months, vec![1, 2]);
    }

    #[test]
    fn test_totals_ignore_withdrawal_payments() {
        let (db, member) = setup();
        seed_payment(&db, "p1", &member, 1, 5_000, date(1, 5));
        let mut withdrawal = db.get_payment("p1").unwrap().unwrap();
        withdrawal.id = "p2".to_string();
        withdrawal.payment_type = PaymentType::Withdrawal;
        withdrawal.month_number = 3;
        db.insert_payment(&withdrawal).unwrap();

        let totals = db.member_contribution_totals("m1").unwrap();
        assert_eq!(totals.months_paid, 1);
        assert_eq!(totals.paid_amount, 5_000);
    }

    #[test]
    fn test_totals_for_member_without_payments() {
        let (db, _) = setup();
        assert_eq!(
            db.member_contribution_totals("m1").unwrap(),
            ContributionTotals::default()
        );
    }

    #[test]
    fn test_payments_reject_update_and_delete() {
        let (db, member) = setup();
        seed_payment(&db, "p1", &member, 1, 5_000, date(1, 5));

        let err = db
            .conn_ref()
            .execute("UPDATE payments SET amount = 1 WHERE id = 'p1'", [])
            .expect_err("update rejected");
        assert!(err.to_string().contains("immutable"));
        let err = db
            .conn_ref()
            .execute("DELETE FROM payments WHERE id = 'p1'", [])
            .expect_err("delete rejected");
        assert!(err.to_string().contains("immutable"));

        let payment = db.get_payment("p1").unwrap().unwrap();
        assert_eq!(payment.amount, 5_000);
        assert_eq!(payment.payment_method, PaymentMethod::Cash);
    }

    #[test]
    fn test_list_orders_by_month_then_date() {
        let (db, member) = setup();
        seed_payment(&db, "p3", &member, 3, 5_000, date(3, 1));
        seed_payment(&db, "p1", &member, 1, 5_000, date(1, 1));
        seed_payment(&db, "p2", &member, 1, 5_000, date(1, 15));

        let ids: Vec<String> = db
            .list_member_payments("m1")
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_payments_between_is_inclusive() {
        let (db, member) = setup();
        seed_payment(&db, "p1", &member, 1, 5_000, date(1, 1));
        seed_payment(&db, "p2", &member, 2, 5_000, date(1, 31));
        seed_payment(&db, "p3", &member, 3, 5_000, date(2, 1));

        let found = db.list_payments_between(date(1, 1), date(1, 31)).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(db.list_fund_payments("f1").unwrap().len(), 3);
    }
}
