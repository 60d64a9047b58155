use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Basis points in one whole (100%).
pub const BPS_SCALE: u32 = 10_000;

/// Largest fund, payment or override amount accepted (one lakh crore).
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Main configuration, read from `~/.chitbook/config.json`.
///
/// Every field has a serde default so an empty `{}` (or a missing file) is a
/// valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Override for the ledger database location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default)]
    pub rules: FundRules,
    #[serde(default)]
    pub gst: GstConfig,
}

/// Business parameters for contribution, bonus, commission and penalty
/// arithmetic. All rates are basis points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundRules {
    #[serde(default = "default_duration_months")]
    pub duration_months: u32,
    /// Share of the fund amount paid in each month (5%).
    #[serde(default = "default_contribution_rate")]
    pub contribution_rate_bps: u32,
    /// Monthly bonus as a share of the monthly payment, used by payouts (20%).
    #[serde(default = "default_payout_bonus_rate")]
    pub payout_bonus_rate_bps: u32,
    /// Display-only bonus estimate on the contribution screen (10%).
    #[serde(default = "default_expected_bonus_rate")]
    pub expected_bonus_rate_bps: u32,
    /// Default commission as a share of the fund amount ("5k per lakh").
    #[serde(default = "default_commission_rate")]
    pub commission_rate_bps: u32,
    /// Flat charge per month of delay past the member's next due month.
    #[serde(default = "default_delay_penalty")]
    pub delay_penalty_per_month: i64,
    /// Flat monthly bonus assigned to new funds.
    #[serde(default = "default_flat_monthly_bonus")]
    pub default_monthly_bonus: i64,
    #[serde(default)]
    pub bonus_policy: BonusPolicy,
}

fn default_duration_months() -> u32 {
    20
}
fn default_contribution_rate() -> u32 {
    500
}
fn default_payout_bonus_rate() -> u32 {
    2_000
}
fn default_expected_bonus_rate() -> u32 {
    1_000
}
fn default_commission_rate() -> u32 {
    500
}
fn default_delay_penalty() -> i64 {
    1_000
}
fn default_flat_monthly_bonus() -> i64 {
    1_000
}

impl Default for FundRules {
    fn default() -> Self {
        Self {
            duration_months: default_duration_months(),
            contribution_rate_bps: default_contribution_rate(),
            payout_bonus_rate_bps: default_payout_bonus_rate(),
            expected_bonus_rate_bps: default_expected_bonus_rate(),
            commission_rate_bps: default_commission_rate(),
            delay_penalty_per_month: default_delay_penalty(),
            default_monthly_bonus: default_flat_monthly_bonus(),
            bonus_policy: BonusPolicy::default(),
        }
    }
}

impl FundRules {
    /// Check every rule against the range the arithmetic accepts.
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_months == 0 {
            return Err("durationMonths must be positive".to_string());
        }
        if self.contribution_rate_bps == 0 || self.contribution_rate_bps > BPS_SCALE {
            return Err(format!(
                "contributionRateBps must be between 1 and {BPS_SCALE} (got {})",
                self.contribution_rate_bps
            ));
        }
        for (name, bps) in [
            ("payoutBonusRateBps", self.payout_bonus_rate_bps),
            ("expectedBonusRateBps", self.expected_bonus_rate_bps),
            ("commissionRateBps", self.commission_rate_bps),
        ] {
            if bps > BPS_SCALE {
                return Err(format!("{name} must be at most {BPS_SCALE} (got {bps})"));
            }
        }
        for (name, amount) in [
            ("delayPenaltyPerMonth", self.delay_penalty_per_month),
            ("defaultMonthlyBonus", self.default_monthly_bonus),
        ] {
            if !(0..=MAX_AMOUNT).contains(&amount) {
                return Err(format!(
                    "{name} must be between 0 and {MAX_AMOUNT} (got {amount})"
                ));
            }
        }
        Ok(())
    }
}

/// How the per-month payout bonus is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BonusPolicy {
    /// `monthly payment × payout_bonus_rate_bps`.
    #[default]
    RateOfMonthlyPayment,
    /// The fund's flat `monthly_bonus`, optionally scaled to a member's
    /// custom fund amount.
    #[serde(rename_all = "camelCase")]
    FundFlat { scale_to_custom_amount: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GstConfig {
    /// GST charged on commission income (18%).
    #[serde(default = "default_gst_rate")]
    pub rate_bps: u32,
}

fn default_gst_rate() -> u32 {
    1_800
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        self.rules.validate()?;
        if self.gst.rate_bps > BPS_SCALE {
            return Err(format!(
                "gst.rateBps must be at most {BPS_SCALE} (got {})",
                self.gst.rate_bps
            ));
        }
        Ok(())
    }
}

impl Default for GstConfig {
    fn default() -> Self {
        Self {
            rate_bps: default_gst_rate(),
        }
    }
}

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Generates `as_str`, `Display` and `FromStr` for a text-backed enum.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
    Member,
}

text_enum!(Role, "role", {
    Admin => "admin",
    Agent => "agent",
    Member => "member",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

text_enum!(UserStatus, "user status", {
    Active => "active",
    Inactive => "inactive",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundStatus {
    Active,
    Closed,
}

text_enum!(FundStatus, "fund status", {
    Active => "active",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Monthly,
    Withdrawal,
}

text_enum!(PaymentType, "payment type", {
    Monthly => "monthly",
    Withdrawal => "withdrawal",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Upi,
    Cheque,
    Other,
}

text_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    BankTransfer => "bank_transfer",
    Upi => "upi",
    Cheque => "cheque",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayableStatus {
    Pending,
    Paid,
}

text_enum!(PayableStatus, "payable status", {
    Pending => "pending",
    Paid => "paid",
});
