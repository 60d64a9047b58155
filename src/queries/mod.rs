//! Read-only aggregate queries over the ledger.

pub mod reports;
