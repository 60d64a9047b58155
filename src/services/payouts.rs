// Payout preview and processing.
//
// Processing is one BEGIN IMMEDIATE transaction: the member's live state is
// re-read, the breakdown is recomputed from the ledger, then the withdrawal
// flag and the payable row are written together.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{DbFund, DbFundMember, DbPayable, LedgerDb};
use crate::error::ServiceError;
use crate::payout::{calculate_payout, PayoutBreakdown, PayoutInputs};
use crate::services::funds::{get_fund, require_active_fund};
use crate::services::members::require_member;
use crate::types::{FundRules, PayableStatus};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub fund_member_id: String,
    /// Defaults to the member's stored withdrawal month.
    #[serde(default)]
    pub withdrawal_month: Option<u32>,
    /// Overrides the default commission.
    #[serde(default)]
    pub commission: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutPreview {
    pub breakdown: PayoutBreakdown,
    /// Whether the payout could be submitted as-is.
    pub payable: bool,
    pub already_paid_out: bool,
    /// Marked withdrawn earlier without a payable on record.
    pub incomplete_withdrawal: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutReceipt {
    pub payable: DbPayable,
    pub breakdown: PayoutBreakdown,
    pub completed_incomplete_withdrawal: bool,
}

fn resolve_withdrawal_month(
    member: &DbFundMember,
    requested: Option<u32>,
) -> Result<u32, ServiceError> {
    requested.or(member.withdrawal_month).ok_or_else(|| {
        ServiceError::Validation("a withdrawal month is required".to_string())
    })
}

fn compute(
    db: &LedgerDb,
    rules: &FundRules,
    fund: &DbFund,
    member: &DbFundMember,
    req: &PayoutRequest,
) -> Result<PayoutBreakdown, ServiceError> {
    let withdrawal_month = resolve_withdrawal_month(member, req.withdrawal_month)?;
    let totals = db.member_contribution_totals(&member.id)?;
    let inputs = PayoutInputs {
        fund_amount: fund.amount,
        custom_fund_amount: member.custom_fund_amount,
        fund_monthly_bonus: fund.monthly_bonus,
        duration_months: fund.duration_months,
        months_paid: totals.months_paid,
        paid_amount: totals.paid_amount,
        commission: req.commission,
        withdrawal_month,
    };
    Ok(calculate_payout(rules, &inputs)?)
}

/// Calculate without persisting. Non-positive results are returned with
/// `payable = false` rather than as an error.
pub fn preview_payout(
    db: &LedgerDb,
    rules: &FundRules,
    req: &PayoutRequest,
) -> Result<PayoutPreview, ServiceError> {
    let member = require_member(db, &req.fund_member_id)?;
    let fund = get_fund(db, &member.fund_id)?;
    let breakdown = compute(db, rules, &fund, &member, req)?;
    Ok(PayoutPreview {
        payable: breakdown.is_payable() && !member.has_payable,
        already_paid_out: member.has_payable,
        incomplete_withdrawal: member.is_withdrawn && !member.has_payable,
        breakdown,
    })
}

/// Mark the member withdrawn and record the payable, atomically.
pub fn process_payout(
    db: &LedgerDb,
    rules: &FundRules,
    req: &PayoutRequest,
    processed_by: &str,
) -> Result<PayoutReceipt, ServiceError> {
    db.with_transaction(|tx| {
        let member = require_member(tx, &req.fund_member_id)?;
        if member.has_payable {
            log::warn!("Refused second payout for member {}", member.id);
            return Err(ServiceError::Conflict(
                "member has already been paid out".to_string(),
            ));
        }
        let fund = require_active_fund(tx, &member.fund_id)?;
        let breakdown = compute(tx, rules, &fund, &member, req)?;
        breakdown.ensure_payable()?;

        tx.set_withdrawal_state(&member.id, true, Some(breakdown.withdrawal_month))?;

        let payable = DbPayable {
            id: crate::util::new_id("ap"),
            fund_member_id: member.id.clone(),
            fund_id: fund.id.clone(),
            user_id: member.user_id.clone(),
            amount: breakdown.payout_amount,
            commission: breakdown.commission,
            bonus: breakdown.bonus_amount,
            penalty: breakdown.penalty,
            withdrawal_month: breakdown.withdrawal_month,
            status: PayableStatus::Pending,
            created_by: processed_by.to_string(),
            created_at: Utc::now().to_rfc3339(),
            paid_at: None,
        };
        tx.insert_payable(&payable).map_err(|e| {
            if e.is_constraint_violation() {
                ServiceError::Conflict("member has already been paid out".to_string())
            } else {
                ServiceError::from(e)
            }
        })?;

        log::info!(
            "Processed payout {} of {} for member {} (month {})",
            payable.id,
            payable.amount,
            member.id,
            payable.withdrawal_month
        );
        Ok(PayoutReceipt {
            payable,
            breakdown,
            completed_incomplete_withdrawal: member.is_withdrawn,
        })
    })
}
