// Payment recording and history. Payments are append-only.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{ContributionTotals, DbFundMember, DbPayment, LedgerDb};
use crate::error::ServiceError;
use crate::services::funds::require_active_fund;
use crate::services::members::require_member;
use crate::services::require_amount;
use crate::types::{PaymentMethod, PaymentType};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub fund_member_id: String,
    pub amount: i64,
    pub payment_date: NaiveDate,
    #[serde(default = "default_payment_type")]
    pub payment_type: PaymentType,
    pub month_number: u32,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_payment_type() -> PaymentType {
    PaymentType::Monthly
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Cash
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistory {
    pub member: DbFundMember,
    pub payments: Vec<DbPayment>,
    pub totals: ContributionTotals,
}

/// Append a payment to the ledger.
pub fn record_payment(
    db: &LedgerDb,
    new: &NewPayment,
    recorded_by: &str,
) -> Result<DbPayment, ServiceError> {
    require_amount("payment amount", new.amount)?;
    let member = require_member(db, &new.fund_member_id)?;
    let fund = require_active_fund(db, &member.fund_id)?;
    if new.month_number == 0 || new.month_number > fund.duration_months {
        return Err(ServiceError::Validation(format!(
            "month {} is outside the fund term (1 to {})",
            new.month_number, fund.duration_months
        )));
    }

    let payment = DbPayment {
        id: crate::util::new_id("pay"),
        fund_member_id: member.id.clone(),
        fund_id: fund.id.clone(),
        user_id: member.user_id.clone(),
        amount: new.amount,
        payment_date: new.payment_date,
        payment_type: new.payment_type,
        month_number: new.month_number,
        payment_method: new.payment_method,
        recorded_by: recorded_by.to_string(),
        notes: new
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        created_at: Utc::now().to_rfc3339(),
    };
    db.insert_payment(&payment)?;
    log::info!(
        "Recorded {} payment {} of {} for member {} month {}",
        payment.payment_type,
        payment.id,
        payment.amount,
        member.id,
        payment.month_number
    );
    Ok(payment)
}

pub fn payment_history(db: &LedgerDb, member_id: &str) -> Result<PaymentHistory, ServiceError> {
    let member = require_member(db, member_id)?;
    let payments = db.list_member_payments(&member.id)?;
    let totals = db.member_contribution_totals(&member.id)?;
    Ok(PaymentHistory {
        member,
        payments,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{seed_fund, seed_member, seed_user, test_db};
    use crate::types::Role;

    fn setup() -> LedgerDb {
        let db = test_db();
        seed_user(&db, "agent", Role::Agent);
        seed_user(&db, "u1", Role::Member);
        seed_fund(&db, "f1", 100_000);
        seed_member(&db, "m1", "f1", "u1");
        db
    }

    fn payment(month: u32, amount: i64, day: u32) -> NewPayment {
        NewPayment {
            fund_member_id: "m1".to_string(),
            amount,
            payment_date: NaiveDate::from_ymd_opt(2025, month.min(12), day).unwrap(),
            payment_type: PaymentType::Monthly,
            month_number: month,
            payment_method: PaymentMethod::Upi,
            notes: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_record_payment_fills_denormalized_fields() {
        let db = setup();
        let p = record_payment(&db, &payment(1, 5_000, 5), "agent").unwrap();
        assert!(p.id.starts_with("pay-"));
        assert_eq!(p.fund_id, "f1");
        assert_eq!(p.user_id, "u1");
        assert_eq!(p.recorded_by, "agent");
        assert_eq!(p.notes, None);
    }

    #[test]
    fn test_record_payment_validation() {
        let db = setup();
        assert!(matches!(
            record_payment(&db, &payment(1, 0, 5), "agent"),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            record_payment(&db, &payment(1, i64::MAX, 5), "agent"),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            record_payment(&db, &payment(21, 5_000, 5), "agent"),
            Err(ServiceError::Validation(_))
        ));
        let mut orphan = payment(1, 5_000, 5);
        orphan.fund_member_id = "nobody".to_string();
        assert!(matches!(
            record_payment(&db, &orphan, "agent"),
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_closed_fund_rejects_payments() {
        let db = setup();
        db.close_fund("f1").unwrap();
        assert!(matches!(
            record_payment(&db, &payment(1, 5_000, 5), "agent"),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn test_history_dedups_months() {
        let db = setup();
        record_payment(&db, &payment(2, 5_000, 3), "agent").unwrap();
        record_payment(&db, &payment(1, 2_500, 9), "agent").unwrap();
        record_payment(&db, &payment(1, 2_500, 2), "agent").unwrap();

        let history = payment_history(&db, "m1").unwrap();
        let months: Vec<u32> = history.payments.iter().map(|p| p.month_number).collect();
        assert_eq!(months, vec![1, 1, 2]);
        assert!(history.payments[0].payment_date < history.payments[1].payment_date);
        assert_eq!(history.totals.months_paid, 2);
        assert_eq!(history.totals.paid_amount, 10_000);
        assert_eq!(history.totals.unique_months, vec![1, 2]);
    }

    #[test]
    fn test_withdrawal_payments_do_not_count_as_months() {
        let db = setup();
        let mut w = payment(3, 1_000, 1);
        w.payment_type = PaymentType::Withdrawal;
        record_payment(&db, &w, "agent").unwrap();

        let history = payment_history(&db, "m1").unwrap();
        assert_eq!(history.payments.len(), 1);
        assert_eq!(history.totals.months_paid, 0);
        assert_eq!(history.totals.paid_amount, 0);
    }
}
