// Funds service: creation with rule-derived defaults, and closing.

use chrono::{Months, NaiveDate, Utc};
use serde::Deserialize;

use crate::db::{DbFund, LedgerDb};
use crate::error::ServiceError;
use crate::payout::{default_commission, monthly_payment};
use crate::services::require_amount;
use crate::types::{FundRules, FundStatus, MAX_AMOUNT};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFund {
    pub name: String,
    pub amount: i64,
    pub start_date: NaiveDate,
    /// Defaults to `commission_rate_bps` of the amount.
    #[serde(default)]
    pub base_commission: Option<i64>,
    /// Defaults to the configured flat monthly bonus.
    #[serde(default)]
    pub monthly_bonus: Option<i64>,
}

/// Create a fund. Duration comes from the rules; the end date is derived.
pub fn create_fund(
    db: &LedgerDb,
    rules: &FundRules,
    new: &NewFund,
    created_by: &str,
) -> Result<DbFund, ServiceError> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("fund name is required".to_string()));
    }
    require_amount("fund amount", new.amount)?;
    if rules.duration_months == 0 {
        return Err(ServiceError::Config("durationMonths must be positive".to_string()));
    }

    let monthly_contribution = monthly_payment(rules, new.amount);
    if monthly_contribution <= 0 {
        return Err(ServiceError::Validation(format!(
            "fund amount {} is too small for a monthly contribution",
            new.amount
        )));
    }

    let base_commission = new
        .base_commission
        .unwrap_or_else(|| default_commission(rules, new.amount));
    if !(0..=MAX_AMOUNT).contains(&base_commission) {
        return Err(ServiceError::Validation(format!(
            "commission must be between 0 and {MAX_AMOUNT} (got {base_commission})"
        )));
    }
    let monthly_bonus = new.monthly_bonus.unwrap_or(rules.default_monthly_bonus);
    if !(0..=MAX_AMOUNT).contains(&monthly_bonus) {
        return Err(ServiceError::Validation(format!(
            "monthly bonus must be between 0 and {MAX_AMOUNT} (got {monthly_bonus})"
        )));
    }

    let end_date = new
        .start_date
        .checked_add_months(Months::new(rules.duration_months))
        .ok_or_else(|| ServiceError::Validation("start date is out of range".to_string()))?;

    let now = Utc::now().to_rfc3339();
    let fund = DbFund {
        id: crate::util::new_id("fund"),
        name: name.to_string(),
        amount: new.amount,
        duration_months: rules.duration_months,
        start_date: new.start_date,
        end_date,
        status: FundStatus::Active,
        base_commission,
        monthly_contribution,
        monthly_bonus,
        created_by: Some(created_by.to_string()),
        created_at: now.clone(),
        updated_at: now,
        closed_at: None,
    };
    db.insert_fund(&fund)?;
    log::info!("Created fund {} ({}) for {}", fund.id, fund.name, fund.amount);
    Ok(fund)
}

pub fn get_fund(db: &LedgerDb, id: &str) -> Result<DbFund, ServiceError> {
    db.get_fund(id)?
        .ok_or_else(|| ServiceError::not_found("Fund", id))
}

/// Load a fund and require it to be open for changes.
pub(crate) fn require_active_fund(db: &LedgerDb, id: &str) -> Result<DbFund, ServiceError> {
    let fund = get_fund(db, id)?;
    if fund.status == FundStatus::Closed {
        return Err(ServiceError::Conflict(format!("fund {} is closed", fund.name)));
    }
    Ok(fund)
}

/// Close a fund. Closing is terminal.
pub fn close_fund(db: &LedgerDb, id: &str) -> Result<DbFund, ServiceError> {
    let fund = require_active_fund(db, id)?;
    if !db.close_fund(&fund.id)? {
        return Err(ServiceError::Conflict(format!("fund {} is closed", fund.name)));
    }
    log::info!("Closed fund {}", fund.id);
    get_fund(db, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{seed_user, test_db};
    use crate::types::Role;

    fn new_fund(amount: i64) -> NewFund {
        NewFund {
            name: "Lakh Chit 2025".to_string(),
            amount,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            base_commission: None,
            monthly_bonus: None,
        }
    }

    #[test]
    fn test_create_fund_derives_defaults() {
        let db = test_db();
        seed_user(&db, "admin", Role::Admin);
        let fund = create_fund(&db, &FundRules::default(), &new_fund(100_000), "admin").unwrap();

        assert_eq!(fund.duration_months, 20);
        assert_eq!(fund.monthly_contribution, 5_000);
        assert_eq!(fund.base_commission, 5_000);
        assert_eq!(fund.monthly_bonus, 1_000);
        // Month arithmetic clamps to the last day of the month.
        assert_eq!(fund.end_date, NaiveDate::from_ymd_opt(2026, 9, 30).unwrap());
        assert_eq!(get_fund(&db, &fund.id).unwrap().name, "Lakh Chit 2025");
    }

    #[test]
    fn test_create_fund_honours_overrides() {
        let db = test_db();
        seed_user(&db, "admin", Role::Admin);
        let mut req = new_fund(200_000);
        req.base_commission = Some(8_000);
        req.monthly_bonus = Some(0);
        let fund = create_fund(&db, &FundRules::default(), &req, "admin").unwrap();
        assert_eq!(fund.base_commission, 8_000);
        assert_eq!(fund.monthly_bonus, 0);
    }

    #[test]
    fn test_create_fund_validation() {
        let db = test_db();
        seed_user(&db, "admin", Role::Admin);
        let rules = FundRules::default();
        for amount in [0, -5, 9, MAX_AMOUNT + 1, i64::MAX] {
            assert!(
                matches!(
                    create_fund(&db, &rules, &new_fund(amount), "admin"),
                    Err(ServiceError::Validation(_))
                ),
                "amount {amount}"
            );
        }
        let mut req = new_fund(100_000);
        req.base_commission = Some(-1);
        assert!(create_fund(&db, &rules, &req, "admin").is_err());
        req.base_commission = None;
        req.monthly_bonus = Some(i64::MAX);
        assert!(matches!(
            create_fund(&db, &rules, &req, "admin"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_close_fund_once() {
        let db = test_db();
        seed_user(&db, "admin", Role::Admin);
        let fund = create_fund(&db, &FundRules::default(), &new_fund(100_000), "admin").unwrap();

        let closed = close_fund(&db, &fund.id).unwrap();
        assert_eq!(closed.status, FundStatus::Closed);
        assert!(matches!(close_fund(&db, &fund.id), Err(ServiceError::Conflict(_))));
        assert!(matches!(
            close_fund(&db, "fund-missing"),
            Err(ServiceError::NotFound { .. })
        ));
    }
}
