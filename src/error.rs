//! Error types for ledger services.
//!
//! Errors are classified by recoverability:
//! - Retryable: the database was busy or locked by another writer
//! - RequiresUserAction: invalid input, missing permission
//! - NonRetryable: missing records, state conflicts, storage failures

use thiserror::Error;

use crate::db::DbError;
use crate::payout::PayoutError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Amount out of range while totalling {0}")]
    Overflow(&'static str),

    #[error(transparent)]
    Payout(#[from] PayoutError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Database(e) if e.is_busy())
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_)
                | ServiceError::Forbidden(_)
                | ServiceError::Config(_)
                | ServiceError::Payout(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "Refresh the page; the record may have been removed.",
            ServiceError::Validation(_) => "Correct the highlighted values and submit again.",
            ServiceError::Conflict(_) => "Reload the latest state before trying again.",
            ServiceError::Forbidden(_) => "Ask an administrator for access.",
            ServiceError::Config(_) => "Check your configuration in ~/.chitbook/config.json",
            ServiceError::Overflow(_) => "Look for an implausibly large amount in the ledger.",
            ServiceError::Payout(PayoutError::NonPositivePayout(_)) => {
                "Lower the commission or review the withdrawal month."
            }
            ServiceError::Payout(_) => "Review the payout inputs and try again.",
            ServiceError::Database(e) if e.is_busy() => "Another update is in progress. Try again.",
            ServiceError::Database(_) => "Check the database file and disk space.",
        }
    }
}

/// Serializable error representation for the command layer.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&ServiceError> for CommandError {
    fn from(err: &ServiceError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        CommandError {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

impl From<ServiceError> for CommandError {
    fn from(err: ServiceError) -> Self {
        CommandError::from(&err)
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_error() -> ServiceError {
        ServiceError::Database(DbError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )))
    }

    #[test]
    fn test_busy_database_is_retryable() {
        let err = busy_error();
        assert!(err.is_retryable());
        let cmd = CommandError::from(&err);
        assert_eq!(cmd.error_type, ErrorType::Retryable);
        assert!(cmd.can_retry);
    }

    #[test]
    fn test_validation_requires_user_action() {
        let cmd = CommandError::from(ServiceError::Validation("amount must be positive".into()));
        assert_eq!(cmd.error_type, ErrorType::RequiresUserAction);
        assert!(!cmd.can_retry);
        assert!(cmd.message.contains("amount must be positive"));
    }

    #[test]
    fn test_non_positive_payout_suggests_commission() {
        let err = ServiceError::from(PayoutError::NonPositivePayout(0));
        assert!(err.requires_user_action());
        assert!(err.recovery_suggestion().contains("commission"));
    }

    #[test]
    fn test_conflict_is_not_retryable() {
        let cmd = CommandError::from(ServiceError::Conflict("already paid out".into()));
        assert_eq!(cmd.error_type, ErrorType::NonRetryable);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["errorType"], "nonRetryable");
    }
}
