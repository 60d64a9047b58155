//! Role-gated entry points. Each command locks the ledger, authorizes the
//! acting user, then delegates to a service. Errors come back as
//! [`CommandError`] so a shell can surface them directly.

use chrono::NaiveDate;

use crate::db::{
    DbFund, DbFundMember, DbMemberGroup, DbPayable, DbPayment, DbReceivable, DbUser, LedgerDb,
};
use crate::error::{CommandError, ServiceError};
use crate::queries::reports::{self, FundSummary, GstSummary};
use crate::roles::{authorize, authorize_self_or, Permission};
use crate::services::funds::NewFund;
use crate::services::groups::GroupShares;
use crate::services::members::ContributionSummary;
use crate::services::payments::{NewPayment, PaymentHistory};
use crate::services::payouts::{PayoutPreview, PayoutReceipt, PayoutRequest};
use crate::services::users::NewUser;
use crate::services::{funds, groups, ledger, members, payments, payouts, users};
use crate::state::AppState;
use crate::types::{FundStatus, Role, UserStatus};

/// Lock the ledger, check `permission` for the actor, then run `f`.
fn gated<T>(
    state: &AppState,
    actor_id: &str,
    permission: Permission,
    f: impl FnOnce(&LedgerDb, &DbUser) -> Result<T, ServiceError>,
) -> Result<T, CommandError> {
    state
        .with_ledger(|db| {
            let actor = authorize(db, actor_id, permission)?;
            f(db, &actor)
        })
        .map_err(CommandError::from)
}

/// Like [`gated`], but the permission depends on whose member record is read.
fn gated_member<T>(
    state: &AppState,
    actor_id: &str,
    member_id: &str,
    f: impl FnOnce(&LedgerDb, &DbFundMember) -> Result<T, ServiceError>,
) -> Result<T, CommandError> {
    state
        .with_ledger(|db| {
            // Unknown or inactive actors are refused before the lookup.
            authorize(db, actor_id, Permission::ViewOwnLedger)?;
            let member = members::require_member(db, member_id)?;
            authorize_self_or(db, actor_id, &member.user_id)?;
            f(db, &member)
        })
        .map_err(CommandError::from)
}

// =============================================================================
// Users
// =============================================================================

pub fn create_user(state: &AppState, actor_id: &str, req: NewUser) -> Result<DbUser, CommandError> {
    gated(state, actor_id, Permission::ManageUsers, |db, _| {
        users::create_user(db, &req)
    })
}

/// Self-registration. Needs no acting user and always yields a member.
pub fn register(
    state: &AppState,
    name: &str,
    email: &str,
    phone: Option<&str>,
) -> Result<DbUser, CommandError> {
    state
        .with_ledger(|db| users::register_member(db, name, email, phone))
        .map_err(CommandError::from)
}

pub fn list_users(
    state: &AppState,
    actor_id: &str,
    role: Option<Role>,
) -> Result<Vec<DbUser>, CommandError> {
    gated(state, actor_id, Permission::ManageUsers, |db, _| {
        Ok(db.list_users(role)?)
    })
}

pub fn set_user_role(
    state: &AppState,
    actor_id: &str,
    user_id: &str,
    role: Role,
) -> Result<DbUser, CommandError> {
    gated(state, actor_id, Permission::ManageUsers, |db, _| {
        users::set_user_role(db, user_id, role)
    })
}

pub fn set_user_status(
    state: &AppState,
    actor_id: &str,
    user_id: &str,
    status: UserStatus,
) -> Result<DbUser, CommandError> {
    gated(state, actor_id, Permission::ManageUsers, |db, _| {
        users::set_user_status(db, user_id, status)
    })
}

// =============================================================================
// Funds and members
// =============================================================================

pub fn create_fund(state: &AppState, actor_id: &str, req: NewFund) -> Result<DbFund, CommandError> {
    let rules = state.config().rules;
    gated(state, actor_id, Permission::ManageFunds, |db, actor| {
        funds::create_fund(db, &rules, &req, &actor.id)
    })
}

pub fn close_fund(state: &AppState, actor_id: &str, fund_id: &str) -> Result<DbFund, CommandError> {
    gated(state, actor_id, Permission::ManageFunds, |db, _| {
        funds::close_fund(db, fund_id)
    })
}

pub fn list_funds(
    state: &AppState,
    actor_id: &str,
    status: Option<FundStatus>,
) -> Result<Vec<DbFund>, CommandError> {
    gated(state, actor_id, Permission::ViewLedger, |db, _| {
        Ok(db.list_funds(status)?)
    })
}

pub fn get_fund(state: &AppState, actor_id: &str, fund_id: &str) -> Result<DbFund, CommandError> {
    gated(state, actor_id, Permission::ViewLedger, |db, _| {
        funds::get_fund(db, fund_id)
    })
}

/// The acting user's own memberships, across funds.
pub fn my_memberships(state: &AppState, actor_id: &str) -> Result<Vec<DbFundMember>, CommandError> {
    gated(state, actor_id, Permission::ViewOwnLedger, |db, actor| {
        Ok(db.list_memberships_for_user(&actor.id)?)
    })
}

/// Funds the acting user belongs to.
pub fn my_funds(state: &AppState, actor_id: &str) -> Result<Vec<DbFund>, CommandError> {
    gated(state, actor_id, Permission::ViewOwnLedger, |db, actor| {
        Ok(db.list_funds_for_user(&actor.id)?)
    })
}

pub fn add_fund_member(
    state: &AppState,
    actor_id: &str,
    fund_id: &str,
    user_id: &str,
    share_identifier: Option<&str>,
) -> Result<DbFundMember, CommandError> {
    gated(state, actor_id, Permission::ManageMembers, |db, _| {
        members::add_member(db, fund_id, user_id, share_identifier)
    })
}

pub fn list_fund_members(
    state: &AppState,
    actor_id: &str,
    fund_id: &str,
) -> Result<Vec<DbFundMember>, CommandError> {
    gated(state, actor_id, Permission::ViewLedger, |db, _| {
        let fund = funds::get_fund(db, fund_id)?;
        Ok(db.list_fund_members(&fund.id)?)
    })
}

pub fn set_custom_fund_amount(
    state: &AppState,
    actor_id: &str,
    member_id: &str,
    amount: i64,
) -> Result<DbFundMember, CommandError> {
    gated(state, actor_id, Permission::ManageMembers, |db, _| {
        members::set_custom_fund_amount(db, member_id, amount)
    })
}

pub fn set_custom_monthly_amount(
    state: &AppState,
    actor_id: &str,
    member_id: &str,
    amount: i64,
) -> Result<DbFundMember, CommandError> {
    gated(state, actor_id, Permission::ManageMembers, |db, _| {
        members::set_custom_monthly_amount(db, member_id, amount)
    })
}

pub fn clear_contribution_override(
    state: &AppState,
    actor_id: &str,
    member_id: &str,
) -> Result<DbFundMember, CommandError> {
    gated(state, actor_id, Permission::ManageMembers, |db, _| {
        members::clear_contribution_override(db, member_id)
    })
}

pub fn get_contribution_summary(
    state: &AppState,
    actor_id: &str,
    member_id: &str,
) -> Result<ContributionSummary, CommandError> {
    let rules = state.config().rules;
    gated_member(state, actor_id, member_id, |db, member| {
        members::contribution_summary(db, &rules, &member.id)
    })
}

pub fn set_withdrawal_status(
    state: &AppState,
    actor_id: &str,
    member_id: &str,
    is_withdrawn: bool,
    withdrawal_month: Option<u32>,
) -> Result<DbFundMember, CommandError> {
    gated(state, actor_id, Permission::ManageMembers, |db, _| {
        members::set_withdrawal_status(db, member_id, is_withdrawn, withdrawal_month)
    })
}

// =============================================================================
// Payments and payouts
// =============================================================================

pub fn record_payment(
    state: &AppState,
    actor_id: &str,
    req: NewPayment,
) -> Result<DbPayment, CommandError> {
    gated(state, actor_id, Permission::RecordPayment, |db, actor| {
        payments::record_payment(db, &req, &actor.id)
    })
}

pub fn get_payment_history(
    state: &AppState,
    actor_id: &str,
    member_id: &str,
) -> Result<PaymentHistory, CommandError> {
    gated_member(state, actor_id, member_id, |db, member| {
        payments::payment_history(db, &member.id)
    })
}

pub fn preview_payout(
    state: &AppState,
    actor_id: &str,
    req: PayoutRequest,
) -> Result<PayoutPreview, CommandError> {
    let rules = state.config().rules;
    gated(state, actor_id, Permission::PreviewPayout, |db, _| {
        payouts::preview_payout(db, &rules, &req)
    })
}

pub fn process_payout(
    state: &AppState,
    actor_id: &str,
    req: PayoutRequest,
) -> Result<PayoutReceipt, CommandError> {
    let rules = state.config().rules;
    gated(state, actor_id, Permission::ProcessPayout, |db, actor| {
        payouts::process_payout(db, &rules, &req, &actor.id)
    })
}

// =============================================================================
// Ledger projections
// =============================================================================

pub fn list_payables(
    state: &AppState,
    actor_id: &str,
    fund_id: Option<&str>,
) -> Result<Vec<DbPayable>, CommandError> {
    gated(state, actor_id, Permission::ViewLedger, |db, _| {
        ledger::list_payables(db, fund_id)
    })
}

pub fn mark_payable_paid(
    state: &AppState,
    actor_id: &str,
    payable_id: &str,
) -> Result<DbPayable, CommandError> {
    gated(state, actor_id, Permission::ProcessPayout, |db, _| {
        ledger::mark_payable_paid(db, payable_id)
    })
}

pub fn list_receivables(
    state: &AppState,
    actor_id: &str,
    fund_id: Option<&str>,
) -> Result<Vec<DbReceivable>, CommandError> {
    gated(state, actor_id, Permission::ViewLedger, |db, _| {
        ledger::list_receivables(db, fund_id)
    })
}

pub fn sync_receivables(state: &AppState, actor_id: &str) -> Result<usize, CommandError> {
    gated(state, actor_id, Permission::Reporting, |db, _| {
        ledger::sync_receivables(db)
    })
}

// =============================================================================
// Groups
// =============================================================================

pub fn create_group(
    state: &AppState,
    actor_id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<DbMemberGroup, CommandError> {
    gated(state, actor_id, Permission::ManageGroups, |db, _| {
        groups::create_group(db, name, description)
    })
}

pub fn list_groups(state: &AppState, actor_id: &str) -> Result<Vec<DbMemberGroup>, CommandError> {
    gated(state, actor_id, Permission::ManageGroups, |db, _| {
        Ok(db.list_groups()?)
    })
}

pub fn get_group_shares(
    state: &AppState,
    actor_id: &str,
    group_id: &str,
) -> Result<GroupShares, CommandError> {
    gated(state, actor_id, Permission::ManageGroups, |db, _| {
        groups::group_shares(db, group_id)
    })
}

pub fn set_group_share(
    state: &AppState,
    actor_id: &str,
    group_id: &str,
    user_id: &str,
    share_bps: u32,
) -> Result<GroupShares, CommandError> {
    gated(state, actor_id, Permission::ManageGroups, |db, _| {
        groups::set_group_share(db, group_id, user_id, share_bps)
    })
}

pub fn remove_group_member(
    state: &AppState,
    actor_id: &str,
    group_id: &str,
    user_id: &str,
) -> Result<GroupShares, CommandError> {
    gated(state, actor_id, Permission::ManageGroups, |db, _| {
        groups::remove_group_member(db, group_id, user_id)
    })
}

pub fn attach_group_to_fund(
    state: &AppState,
    actor_id: &str,
    group_id: &str,
    fund_id: &str,
) -> Result<Vec<DbFundMember>, CommandError> {
    gated(state, actor_id, Permission::ManageGroups, |db, _| {
        groups::attach_group_to_fund(db, group_id, fund_id)
    })
}

// =============================================================================
// Reports
// =============================================================================

pub fn gst_report(
    state: &AppState,
    actor_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<GstSummary, CommandError> {
    let gst = state.config().gst;
    gated(state, actor_id, Permission::Reporting, |db, _| {
        reports::gst_summary(db, &gst, from, to)
    })
}

pub fn fund_summary(
    state: &AppState,
    actor_id: &str,
    fund_id: &str,
) -> Result<FundSummary, CommandError> {
    gated(state, actor_id, Permission::Reporting, |db, _| {
        reports::fund_summary(db, fund_id)
    })
}
