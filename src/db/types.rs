use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{
    FundStatus, PayableStatus, PaymentMethod, PaymentType, Role, UserStatus,
};

/// Errors specific to ledger database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl DbError {
    /// True when SQLite reported the database as busy or locked by another writer.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }

    /// True when SQLite rejected a write on a UNIQUE/CHECK/trigger constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `chit_funds` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFund {
    pub id: String,
    pub name: String,
    pub amount: i64,
    pub duration_months: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: FundStatus,
    pub base_commission: i64,
    pub monthly_contribution: i64,
    pub monthly_bonus: i64,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub closed_at: Option<String>,
}

/// A row from the `fund_members` table.
///
/// `has_payable` is derived from `accounts_payable` at read time and is
/// ignored on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFundMember {
    pub id: String,
    pub fund_id: String,
    pub user_id: String,
    pub custom_fund_amount: Option<i64>,
    pub increased_monthly_amount: Option<i64>,
    pub share_identifier: Option<String>,
    pub is_withdrawn: bool,
    pub withdrawal_month: Option<u32>,
    pub joined_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub has_payable: bool,
    /// Joined from `users.name` on list queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// A row from the `payments` table. Rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPayment {
    pub id: String,
    pub fund_member_id: String,
    pub fund_id: String,
    pub user_id: String,
    pub amount: i64,
    pub payment_date: NaiveDate,
    pub payment_type: PaymentType,
    pub month_number: u32,
    pub payment_method: PaymentMethod,
    pub recorded_by: String,
    pub notes: Option<String>,
    pub created_at: String,
}

/// A row from the `accounts_payable` table: money owed to a withdrawing member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPayable {
    pub id: String,
    pub fund_member_id: String,
    pub fund_id: String,
    pub user_id: String,
    pub amount: i64,
    pub commission: i64,
    pub bonus: i64,
    pub penalty: i64,
    pub withdrawal_month: u32,
    pub status: PayableStatus,
    pub created_by: String,
    pub created_at: String,
    pub paid_at: Option<String>,
}

/// A row from the `accounts_receivable` table, projected from `payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbReceivable {
    pub id: String,
    pub payment_id: String,
    pub fund_id: String,
    pub user_id: String,
    pub amount: i64,
    pub month_number: u32,
    pub received_date: NaiveDate,
    pub created_at: String,
}

/// A row from the `member_groups` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMemberGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `group_members` table joined with the user's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbGroupMember {
    pub group_id: String,
    pub user_id: String,
    pub user_name: String,
    pub share_bps: u32,
    pub added_at: String,
}

/// Aggregate of a member's monthly contributions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionTotals {
    /// Distinct month numbers with at least one monthly payment.
    pub months_paid: u32,
    /// Sum of all monthly payment amounts.
    pub paid_amount: i64,
    pub unique_months: Vec<u32>,
}
