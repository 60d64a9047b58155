// Member groups: users sharing one fund slot by percentage.

use chrono::Utc;
use serde::Serialize;

use crate::db::{DbFundMember, DbGroupMember, DbMemberGroup, LedgerDb};
use crate::error::ServiceError;
use crate::services::funds::require_active_fund;
use crate::services::users::get_user;
use crate::types::{UserStatus, BPS_SCALE};
use crate::util::{apply_bps, slugify};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupShares {
    pub group: DbMemberGroup,
    pub members: Vec<DbGroupMember>,
    pub total_bps: u32,
    /// Shares add up to exactly 100%.
    pub complete: bool,
}

pub fn get_group(db: &LedgerDb, id: &str) -> Result<DbMemberGroup, ServiceError> {
    db.get_group(id)?
        .ok_or_else(|| ServiceError::not_found("Group", id))
}

pub fn create_group(
    db: &LedgerDb,
    name: &str,
    description: Option<&str>,
) -> Result<DbMemberGroup, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("group name is required".to_string()));
    }
    let now = Utc::now().to_rfc3339();
    let group = DbMemberGroup {
        id: crate::util::new_id("grp"),
        name: name.to_string(),
        description: description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_group(&group).map_err(|e| {
        if e.is_constraint_violation() {
            ServiceError::Conflict(format!("a group named {name} already exists"))
        } else {
            ServiceError::from(e)
        }
    })?;
    log::info!("Created group {} ({})", group.id, group.name);
    Ok(group)
}

fn total_bps(members: &[DbGroupMember]) -> u32 {
    members.iter().map(|m| m.share_bps).sum()
}

pub fn group_shares(db: &LedgerDb, group_id: &str) -> Result<GroupShares, ServiceError> {
    let group = get_group(db, group_id)?;
    let members = db.list_group_members(&group.id)?;
    let total_bps = total_bps(&members);
    Ok(GroupShares {
        group,
        members,
        total_bps,
        complete: total_bps == BPS_SCALE,
    })
}

/// Add a user to the group or change their share. The group total may not
/// exceed 100%.
pub fn set_group_share(
    db: &LedgerDb,
    group_id: &str,
    user_id: &str,
    share_bps: u32,
) -> Result<GroupShares, ServiceError> {
    if share_bps == 0 || share_bps > BPS_SCALE {
        return Err(ServiceError::Validation(format!(
            "share must be between 1 and {BPS_SCALE} basis points (got {share_bps})"
        )));
    }
    let group = get_group(db, group_id)?;
    let user = get_user(db, user_id)?;

    let others: u32 = db
        .list_group_members(&group.id)?
        .iter()
        .filter(|m| m.user_id != user.id)
        .map(|m| m.share_bps)
        .sum();
    if others + share_bps > BPS_SCALE {
        return Err(ServiceError::Validation(format!(
            "shares would total {} basis points; the maximum is {BPS_SCALE}",
            others + share_bps
        )));
    }

    db.upsert_group_member(&group.id, &user.id, share_bps)?;
    log::info!("Group {} share for {} set to {} bps", group.id, user.id, share_bps);
    group_shares(db, &group.id)
}

pub fn remove_group_member(
    db: &LedgerDb,
    group_id: &str,
    user_id: &str,
) -> Result<GroupShares, ServiceError> {
    let group = get_group(db, group_id)?;
    if !db.remove_group_member(&group.id, user_id)? {
        return Err(ServiceError::not_found("Group member", user_id));
    }
    log::info!("Removed {} from group {}", user_id, group.id);
    group_shares(db, &group.id)
}

/// Split a principal by shares; the last entry absorbs rounding so the
/// parts sum to `amount`.
fn split_by_shares(amount: i64, shares: &[u32]) -> Vec<i64> {
    let mut parts: Vec<i64> = shares.iter().map(|&s| apply_bps(amount, s)).collect();
    if let Some((last, rest)) = parts.split_last_mut() {
        *last = amount - rest.iter().sum::<i64>();
    }
    parts
}

/// Enrol every group member in the fund with a share of its principal.
///
/// All-or-nothing: shares must total exactly 100% and no group member may
/// already belong to the fund.
pub fn attach_group_to_fund(
    db: &LedgerDb,
    group_id: &str,
    fund_id: &str,
) -> Result<Vec<DbFundMember>, ServiceError> {
    db.with_transaction(|tx| {
        let shares = group_shares(tx, group_id)?;
        if shares.members.is_empty() {
            return Err(ServiceError::Validation(format!(
                "group {} has no members",
                shares.group.name
            )));
        }
        if !shares.complete {
            return Err(ServiceError::Validation(format!(
                "group shares total {} basis points; exactly {BPS_SCALE} is required",
                shares.total_bps
            )));
        }
        let fund = require_active_fund(tx, fund_id)?;

        for gm in &shares.members {
            let user = get_user(tx, &gm.user_id)?;
            if user.status != UserStatus::Active {
                return Err(ServiceError::Validation(format!("user {} is inactive", user.name)));
            }
            if tx.get_fund_member_by_user(&fund.id, &gm.user_id)?.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "{} is already a member of {}",
                    gm.user_name, fund.name
                )));
            }
        }

        let bps: Vec<u32> = shares.members.iter().map(|m| m.share_bps).collect();
        let amounts = split_by_shares(fund.amount, &bps);
        if let Some((gm, amount)) = shares
            .members
            .iter()
            .zip(&amounts)
            .find(|(_, amount)| **amount <= 0)
        {
            return Err(ServiceError::Validation(format!(
                "{}'s share of {} comes to {}; the principal is too small to split",
                gm.user_name, fund.amount, amount
            )));
        }
        let slug = slugify(&shares.group.name);
        let now = Utc::now().to_rfc3339();

        let mut created = Vec::with_capacity(shares.members.len());
        for (n, (gm, amount)) in shares.members.iter().zip(amounts).enumerate() {
            let member = DbFundMember {
                id: crate::util::new_id("mem"),
                fund_id: fund.id.clone(),
                user_id: gm.user_id.clone(),
                custom_fund_amount: Some(amount),
                increased_monthly_amount: None,
                share_identifier: Some(format!("{}-{}", slug, n + 1)),
                is_withdrawn: false,
                withdrawal_month: None,
                joined_at: now.clone(),
                updated_at: now.clone(),
                has_payable: false,
                user_name: Some(gm.user_name.clone()),
            };
            tx.insert_fund_member(&member)?;
            created.push(member);
        }

        log::info!(
            "Attached group {} to fund {} ({} members)",
            shares.group.id,
            fund.id,
            created.len()
        );
        Ok(created)
    })
}
