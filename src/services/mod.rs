// Business logic over the ledger. Services assume the caller has already
// authorized the actor (see `crate::roles`); they validate inputs and
// enforce state invariants.

pub mod funds;
pub mod groups;
pub mod ledger;
pub mod members;
pub mod payments;
pub mod payouts;
pub mod users;

use crate::error::ServiceError;
use crate::types::MAX_AMOUNT;

/// Money inputs must lie in `1..=MAX_AMOUNT`.
pub(crate) fn require_amount(label: &str, amount: i64) -> Result<(), ServiceError> {
    if amount <= 0 {
        return Err(ServiceError::Validation(format!(
            "{label} must be positive (got {amount})"
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(ServiceError::Validation(format!(
            "{label} exceeds the maximum of {MAX_AMOUNT} (got {amount})"
        )));
    }
    Ok(())
}
