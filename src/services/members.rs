// Fund membership: joining, contribution overrides and the withdrawal toggle.

use chrono::Utc;
use serde::Serialize;

use crate::contribution::{contribution_plan, ContributionPlan};
use crate::db::{ContributionTotals, DbFundMember, LedgerDb};
use crate::error::ServiceError;
use crate::services::funds::{get_fund, require_active_fund};
use crate::services::require_amount;
use crate::services::users::get_user;
use crate::types::{FundRules, UserStatus};

/// Member with their effective contribution and what they have paid so far.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionSummary {
    pub member: DbFundMember,
    pub plan: ContributionPlan,
    pub totals: ContributionTotals,
}

pub fn require_member(db: &LedgerDb, member_id: &str) -> Result<DbFundMember, ServiceError> {
    db.get_fund_member(member_id)?
        .ok_or_else(|| ServiceError::not_found("Fund member", member_id))
}

pub fn add_member(
    db: &LedgerDb,
    fund_id: &str,
    user_id: &str,
    share_identifier: Option<&str>,
) -> Result<DbFundMember, ServiceError> {
    let fund = require_active_fund(db, fund_id)?;
    let user = get_user(db, user_id)?;
    if user.status != UserStatus::Active {
        return Err(ServiceError::Validation(format!(
            "user {} is inactive",
            user.name
        )));
    }
    if db.get_fund_member_by_user(&fund.id, &user.id)?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "{} is already a member of {}",
            user.name, fund.name
        )));
    }

    let now = Utc::now().to_rfc3339();
    let member = DbFundMember {
        id: crate::util::new_id("mem"),
        fund_id: fund.id.clone(),
        user_id: user.id.clone(),
        custom_fund_amount: None,
        increased_monthly_amount: None,
        share_identifier: share_identifier
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        is_withdrawn: false,
        withdrawal_month: None,
        joined_at: now.clone(),
        updated_at: now,
        has_payable: false,
        user_name: Some(user.name),
    };
    db.insert_fund_member(&member)?;
    log::info!("Added user {} to fund {} as {}", user.id, fund.id, member.id);
    Ok(member)
}

/// Overrides can change while the fund is open and nothing has been paid out.
fn require_editable_member(db: &LedgerDb, member_id: &str) -> Result<DbFundMember, ServiceError> {
    let member = require_member(db, member_id)?;
    require_active_fund(db, &member.fund_id)?;
    if member.has_payable {
        return Err(ServiceError::Conflict(
            "member has already been paid out".to_string(),
        ));
    }
    Ok(member)
}

/// Set a custom principal for the member; clears any custom monthly amount.
pub fn set_custom_fund_amount(
    db: &LedgerDb,
    member_id: &str,
    amount: i64,
) -> Result<DbFundMember, ServiceError> {
    require_amount("custom fund amount", amount)?;
    let member = require_editable_member(db, member_id)?;
    db.set_contribution_override(&member.id, Some(amount), None)?;
    log::info!("Member {} custom fund amount set to {}", member.id, amount);
    require_member(db, member_id)
}

/// Set a direct monthly contribution; clears any custom principal.
pub fn set_custom_monthly_amount(
    db: &LedgerDb,
    member_id: &str,
    amount: i64,
) -> Result<DbFundMember, ServiceError> {
    require_amount("monthly amount", amount)?;
    let member = require_editable_member(db, member_id)?;
    db.set_contribution_override(&member.id, None, Some(amount))?;
    log::info!("Member {} monthly amount set to {}", member.id, amount);
    require_member(db, member_id)
}

pub fn clear_contribution_override(
    db: &LedgerDb,
    member_id: &str,
) -> Result<DbFundMember, ServiceError> {
    let member = require_editable_member(db, member_id)?;
    db.set_contribution_override(&member.id, None, None)?;
    log::info!("Member {} contribution override cleared", member.id);
    require_member(db, member_id)
}

pub fn contribution_summary(
    db: &LedgerDb,
    rules: &FundRules,
    member_id: &str,
) -> Result<ContributionSummary, ServiceError> {
    let member = require_member(db, member_id)?;
    let fund = get_fund(db, &member.fund_id)?;
    let plan = contribution_plan(rules, &fund, &member);
    let totals = db.member_contribution_totals(&member.id)?;
    Ok(ContributionSummary {
        member,
        plan,
        totals,
    })
}

/// Flip the withdrawal flag without any payout calculation.
///
/// Clearing the flag also clears the month. Once a payable exists the
/// withdrawal state is frozen: only a request matching the stored state is
/// accepted, as a no-op.
pub fn set_withdrawal_status(
    db: &LedgerDb,
    member_id: &str,
    is_withdrawn: bool,
    withdrawal_month: Option<u32>,
) -> Result<DbFundMember, ServiceError> {
    let member = require_member(db, member_id)?;
    let fund = get_fund(db, &member.fund_id)?;

    let month = if is_withdrawn { withdrawal_month } else { None };
    if let Some(m) = month {
        if m == 0 || m > fund.duration_months {
            return Err(ServiceError::Validation(format!(
                "withdrawal month {m} is outside the fund term (1 to {})",
                fund.duration_months
            )));
        }
    }
    if member.has_payable {
        if is_withdrawn == member.is_withdrawn && month == member.withdrawal_month {
            return Ok(member);
        }
        log::warn!("Refused to change withdrawal for paid-out member {}", member.id);
        return Err(ServiceError::Conflict(
            "member has a payout on record; the withdrawal cannot be changed".to_string(),
        ));
    }

    db.set_withdrawal_state(&member.id, is_withdrawn, month)?;
    log::info!(
        "Member {} withdrawal set to {} (month {:?})",
        member.id,
        is_withdrawn,
        month
    );
    require_member(db, member_id)
}
