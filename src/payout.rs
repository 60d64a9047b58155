//! Payout arithmetic for a withdrawing member.
//!
//! Everything here is pure: inputs come from the fund record, the member's
//! overrides and the payment ledger; the caller persists the result.
//!
//! ```text
//! monthlyPayment = F × contribution_rate
//! bonusAmount    = monthsPaid × monthlyBonus
//! remaining      = max(0, F − paid)
//! penalty        = max(0, W − (monthsPaid + 1)) × delay_penalty_per_month
//! payout         = paid + bonusAmount + (remaining − commission) − penalty
//! ```

use serde::Serialize;

use crate::types::{BonusPolicy, FundRules, BPS_SCALE};
use crate::util::{apply_bps, mul_div_round};

/// Everything the calculator needs about one member at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutInputs {
    /// The fund's principal.
    pub fund_amount: i64,
    /// Per-member principal override, if any.
    pub custom_fund_amount: Option<i64>,
    /// The fund's flat monthly bonus (used by `BonusPolicy::FundFlat`).
    pub fund_monthly_bonus: i64,
    pub duration_months: u32,
    /// Distinct months with a monthly payment.
    pub months_paid: u32,
    /// Sum of monthly payment amounts.
    pub paid_amount: i64,
    /// Admin-edited commission; `None` uses the default rate.
    pub commission: Option<i64>,
    pub withdrawal_month: u32,
}

impl PayoutInputs {
    /// The principal the payout is computed against.
    pub fn effective_fund_amount(&self) -> i64 {
        self.custom_fund_amount.unwrap_or(self.fund_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutBreakdown {
    pub effective_fund_amount: i64,
    pub monthly_payment: i64,
    pub monthly_bonus: i64,
    pub months_paid: u32,
    pub paid_amount: i64,
    pub bonus_amount: i64,
    pub remaining_amount: i64,
    pub commission: i64,
    pub withdrawal_month: u32,
    pub delay_months: u32,
    pub penalty: i64,
    pub payout_amount: i64,
}

impl PayoutBreakdown {
    /// Only strictly positive payouts may be submitted.
    pub fn is_payable(&self) -> bool {
        self.payout_amount > 0
    }

    pub fn ensure_payable(&self) -> Result<(), PayoutError> {
        if self.is_payable() {
            Ok(())
        } else {
            Err(PayoutError::NonPositivePayout(self.payout_amount))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    #[error("Withdrawal month {month} is outside the fund term (1 to {duration})")]
    WithdrawalMonthOutOfRange { month: u32, duration: u32 },

    #[error("Commission cannot be negative (got {0})")]
    NegativeCommission(i64),

    #[error("Payout amount must be greater than zero (computed {0})")]
    NonPositivePayout(i64),

    #[error("Payout arithmetic overflowed while computing {0}")]
    AmountOverflow(&'static str),
}

fn overflow(term: &'static str) -> PayoutError {
    PayoutError::AmountOverflow(term)
}

/// Standard monthly contribution for a principal.
pub fn monthly_payment(rules: &FundRules, fund_amount: i64) -> i64 {
    apply_bps(fund_amount, rules.contribution_rate_bps)
}

/// Commission charged when the admin does not override it ("5k per lakh").
pub fn default_commission(rules: &FundRules, fund_amount: i64) -> i64 {
    apply_bps(fund_amount, rules.commission_rate_bps)
}

/// Per-month bonus credited to the withdrawing member.
pub fn monthly_bonus(rules: &FundRules, inputs: &PayoutInputs) -> i64 {
    match rules.bonus_policy {
        BonusPolicy::RateOfMonthlyPayment => {
            // Single rounding step over both rates.
            let numerator = rules.contribution_rate_bps as i64 * rules.payout_bonus_rate_bps as i64;
            let denominator = BPS_SCALE as i64 * BPS_SCALE as i64;
            mul_div_round(inputs.effective_fund_amount(), numerator, denominator)
        }
        BonusPolicy::FundFlat {
            scale_to_custom_amount,
        } => match inputs.custom_fund_amount {
            Some(custom) if scale_to_custom_amount && inputs.fund_amount > 0 => {
                mul_div_round(inputs.fund_monthly_bonus, custom, inputs.fund_amount)
            }
            _ => inputs.fund_monthly_bonus,
        },
    }
}

/// Months of delay past the member's next due month, and the resulting charge.
pub fn delay_penalty(
    rules: &FundRules,
    months_paid: u32,
    withdrawal_month: u32,
) -> Result<(u32, i64), PayoutError> {
    let next_due = months_paid.saturating_add(1);
    let delay = withdrawal_month.saturating_sub(next_due);
    let penalty = i64::from(delay)
        .checked_mul(rules.delay_penalty_per_month)
        .ok_or_else(|| overflow("penalty"))?;
    Ok((delay, penalty))
}

/// Compute the payout breakdown.
///
/// Validates the withdrawal month and commission. A non-positive payout is
/// still returned so previews can show it; use
/// [`PayoutBreakdown::ensure_payable`] before persisting.
pub fn calculate_payout(
    rules: &FundRules,
    inputs: &PayoutInputs,
) -> Result<PayoutBreakdown, PayoutError> {
    if inputs.withdrawal_month == 0 || inputs.withdrawal_month > inputs.duration_months {
        return Err(PayoutError::WithdrawalMonthOutOfRange {
            month: inputs.withdrawal_month,
            duration: inputs.duration_months,
        });
    }

    let fund_amount = inputs.effective_fund_amount();
    let commission = inputs
        .commission
        .unwrap_or_else(|| default_commission(rules, fund_amount));
    if commission < 0 {
        return Err(PayoutError::NegativeCommission(commission));
    }

    let monthly_payment = monthly_payment(rules, fund_amount);
    let monthly_bonus = monthly_bonus(rules, inputs);
    let bonus_amount = i64::from(inputs.months_paid)
        .checked_mul(monthly_bonus)
        .ok_or_else(|| overflow("bonus"))?;
    let remaining_amount = fund_amount
        .checked_sub(inputs.paid_amount)
        .ok_or_else(|| overflow("remaining amount"))?
        .max(0);
    let (delay_months, penalty) =
        delay_penalty(rules, inputs.months_paid, inputs.withdrawal_month)?;

    let payout_amount = inputs
        .paid_amount
        .checked_add(bonus_amount)
        .and_then(|v| v.checked_add(remaining_amount - commission))
        .and_then(|v| v.checked_sub(penalty))
        .ok_or_else(|| overflow("payout amount"))?;

    Ok(PayoutBreakdown {
        effective_fund_amount: fund_amount,
        monthly_payment,
        monthly_bonus,
        months_paid: inputs.months_paid,
        paid_amount: inputs.paid_amount,
        bonus_amount,
        remaining_amount,
        commission,
        withdrawal_month: inputs.withdrawal_month,
        delay_months,
        penalty,
        payout_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(fund: i64, months_paid: u32, paid: i64, w: u32) -> PayoutInputs {
        PayoutInputs {
            fund_amount: fund,
            custom_fund_amount: None,
            fund_monthly_bonus: 1_000,
            duration_months: 20,
            months_paid,
            paid_amount: paid,
            commission: None,
            withdrawal_month: w,
        }
    }

    #[test]
    fn test_lakh_fund_worked_example() {
        let rules = FundRules::default();
        // 1,00,000 fund, 5 months paid at 5,000, withdrawing in month 6.
        let b = calculate_payout(&rules, &inputs(100_000, 5, 25_000, 6)).unwrap();
        assert_eq!(b.monthly_payment, 5_000);
        assert_eq!(b.monthly_bonus, 1_000);
        assert_eq!(b.bonus_amount, 5_000);
        assert_eq!(b.remaining_amount, 75_000);
        assert_eq!(b.commission, 5_000);
        assert_eq!(b.penalty, 0);
        assert_eq!(b.payout_amount, 25_000 + 5_000 + (75_000 - 5_000));
        assert!(b.is_payable());
    }

    #[test]
    fn test_bonus_is_months_times_one_percent_of_fund() {
        let rules = FundRules::default();
        for fund in [20_000_i64, 100_000, 250_000, 1_000_000] {
            for months in [0_u32, 1, 7, 20] {
                let b = calculate_payout(&rules, &inputs(fund, months, 0, 20)).unwrap();
                assert_eq!(
                    b.bonus_amount,
                    months as i64 * (fund * 5 / 100 * 20 / 100),
                    "fund {fund} months {months}"
                );
            }
        }
    }

    #[test]
    fn test_penalty_zero_until_after_next_due_month() {
        let rules = FundRules::default();
        for w in 1..=4 {
            let b = calculate_payout(&rules, &inputs(100_000, 3, 15_000, w)).unwrap();
            assert_eq!(b.penalty, 0, "W={w}");
            assert_eq!(b.delay_months, 0);
        }
    }

    #[test]
    fn test_penalty_grows_by_flat_charge_per_month() {
        let rules = FundRules::default();
        let mut previous = calculate_payout(&rules, &inputs(100_000, 3, 15_000, 4)).unwrap();
        for w in 5..=20 {
            let b = calculate_payout(&rules, &inputs(100_000, 3, 15_000, w)).unwrap();
            assert_eq!(b.penalty - previous.penalty, 1_000, "W={w}");
            assert_eq!(b.delay_months, w - 4);
            previous = b;
        }
    }

    #[test]
    fn test_remaining_never_negative_when_overpaid() {
        let rules = FundRules::default();
        let b = calculate_payout(&rules, &inputs(100_000, 20, 120_000, 20)).unwrap();
        assert_eq!(b.remaining_amount, 0);
        assert_eq!(b.payout_amount, 120_000 + 20 * 1_000 - 5_000);
    }

    #[test]
    fn test_zero_payout_is_not_payable() {
        let rules = FundRules::default();
        let mut i = inputs(100_000, 0, 0, 1);
        // 0 + 0 + (100000 - 100000) - 0 == 0
        i.commission = Some(100_000);
        let b = calculate_payout(&rules, &i).unwrap();
        assert_eq!(b.payout_amount, 0);
        assert!(!b.is_payable());
        assert_eq!(b.ensure_payable(), Err(PayoutError::NonPositivePayout(0)));
    }

    #[test]
    fn test_negative_payout_is_not_payable() {
        let rules = FundRules::default();
        let mut i = inputs(100_000, 0, 0, 20);
        i.commission = Some(90_000);
        let b = calculate_payout(&rules, &i).unwrap();
        // 100000 - 90000 - 19 * 1000
        assert_eq!(b.payout_amount, -9_000);
        assert!(b.ensure_payable().is_err());
    }

    #[test]
    fn test_withdrawal_month_bounds() {
        let rules = FundRules::default();
        assert_eq!(
            calculate_payout(&rules, &inputs(100_000, 0, 0, 0)),
            Err(PayoutError::WithdrawalMonthOutOfRange {
                month: 0,
                duration: 20
            })
        );
        assert!(calculate_payout(&rules, &inputs(100_000, 0, 0, 21)).is_err());
        assert!(calculate_payout(&rules, &inputs(100_000, 0, 0, 20)).is_ok());
    }

    #[test]
    fn test_negative_commission_rejected() {
        let rules = FundRules::default();
        let mut i = inputs(100_000, 2, 10_000, 3);
        i.commission = Some(-1);
        assert_eq!(
            calculate_payout(&rules, &i),
            Err(PayoutError::NegativeCommission(-1))
        );
    }

    #[test]
    fn test_huge_paid_amount_reports_overflow() {
        let rules = FundRules::default();
        let b = calculate_payout(&rules, &inputs(100_000, 1, i64::MAX, 2));
        assert_eq!(b, Err(PayoutError::AmountOverflow("payout amount")));

        let flat = FundRules {
            bonus_policy: BonusPolicy::FundFlat {
                scale_to_custom_amount: false,
            },
            ..FundRules::default()
        };
        let mut i = inputs(100_000, 2, 10_000, 3);
        i.fund_monthly_bonus = i64::MAX;
        assert_eq!(
            calculate_payout(&flat, &i),
            Err(PayoutError::AmountOverflow("bonus"))
        );
    }

    #[test]
    fn test_custom_fund_amount_drives_calculation() {
        let rules = FundRules::default();
        let mut i = inputs(100_000, 2, 5_000, 3);
        i.custom_fund_amount = Some(50_000);
        let b = calculate_payout(&rules, &i).unwrap();
        assert_eq!(b.effective_fund_amount, 50_000);
        assert_eq!(b.monthly_payment, 2_500);
        assert_eq!(b.monthly_bonus, 500);
        assert_eq!(b.commission, 2_500);
        assert_eq!(b.remaining_amount, 45_000);
    }

    #[test]
    fn test_fund_flat_bonus_policy() {
        let mut rules = FundRules::default();
        rules.bonus_policy = BonusPolicy::FundFlat {
            scale_to_custom_amount: false,
        };
        let mut i = inputs(100_000, 4, 20_000, 5);
        i.fund_monthly_bonus = 1_500;
        i.custom_fund_amount = Some(50_000);
        assert_eq!(monthly_bonus(&rules, &i), 1_500);

        rules.bonus_policy = BonusPolicy::FundFlat {
            scale_to_custom_amount: true,
        };
        assert_eq!(monthly_bonus(&rules, &i), 750);

        i.custom_fund_amount = None;
        assert_eq!(monthly_bonus(&rules, &i), 1_500);
    }

    #[test]
    fn test_odd_amount_rounds_once() {
        let rules = FundRules::default();
        // 1% of 12,345 = 123.45 → 123; 5% = 617.25 → 617
        let b = calculate_payout(&rules, &inputs(12_345, 1, 617, 2)).unwrap();
        assert_eq!(b.monthly_bonus, 123);
        assert_eq!(b.monthly_payment, 617);
        assert_eq!(b.commission, 617);
    }
}
