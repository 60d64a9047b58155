//! Effective monthly contribution for a member, honouring overrides.

use serde::Serialize;

use crate::db::{DbFund, DbFundMember};
use crate::types::FundRules;
use crate::util::apply_bps;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContributionSource {
    Standard,
    CustomFundAmount,
    CustomMonthlyAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionPlan {
    pub source: ContributionSource,
    pub effective_fund_amount: i64,
    pub monthly_contribution: i64,
    /// Display-only estimate; payouts use [`crate::payout`].
    pub expected_bonus: i64,
}

pub fn contribution_plan(rules: &FundRules, fund: &DbFund, member: &DbFundMember) -> ContributionPlan {
    let effective_fund_amount = member.custom_fund_amount.unwrap_or(fund.amount);
    let (source, monthly_contribution) = match (
        member.increased_monthly_amount,
        member.custom_fund_amount,
    ) {
        (Some(monthly), _) => (ContributionSource::CustomMonthlyAmount, monthly),
        (None, Some(custom)) => (
            ContributionSource::CustomFundAmount,
            apply_bps(custom, rules.contribution_rate_bps),
        ),
        (None, None) => (ContributionSource::Standard, fund.monthly_contribution),
    };

    ContributionPlan {
        source,
        effective_fund_amount,
        monthly_contribution,
        expected_bonus: apply_bps(monthly_contribution, rules.expected_bonus_rate_bps),
    }
}
