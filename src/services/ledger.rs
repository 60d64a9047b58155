// Payable and receivable projections.

use crate::db::{DbPayable, DbReceivable, LedgerDb};
use crate::error::ServiceError;
use crate::types::PayableStatus;

pub fn list_payables(db: &LedgerDb, fund_id: Option<&str>) -> Result<Vec<DbPayable>, ServiceError> {
    Ok(db.list_payables(fund_id)?)
}

pub fn list_receivables(
    db: &LedgerDb,
    fund_id: Option<&str>,
) -> Result<Vec<DbReceivable>, ServiceError> {
    Ok(db.list_receivables(fund_id)?)
}

/// Settle a pending payable. Paid is terminal.
pub fn mark_payable_paid(db: &LedgerDb, payable_id: &str) -> Result<DbPayable, ServiceError> {
    let payable = db
        .get_payable(payable_id)?
        .ok_or_else(|| ServiceError::not_found("Payable", payable_id))?;
    if payable.status == PayableStatus::Paid || !db.mark_payable_paid(&payable.id)? {
        return Err(ServiceError::Conflict(format!(
            "payable {} is already paid",
            payable.id
        )));
    }
    log::info!("Payable {} marked paid ({})", payable.id, payable.amount);
    db.get_payable(payable_id)?
        .ok_or_else(|| ServiceError::not_found("Payable", payable_id))
}

/// Project receivables from the payment ledger. Returns how many were added.
pub fn sync_receivables(db: &LedgerDb) -> Result<usize, ServiceError> {
    let inserted = db.sync_receivables()?;
    if inserted > 0 {
        log::info!("Synced {} receivables", inserted);
    }
    Ok(inserted)
}
