//! chitbook: bookkeeping for rotating-savings (chit fund) groups.
//!
//! Users hold one of three roles, funds collect monthly contributions from
//! their members, and each member withdraws once through an atomic payout
//! that records a payable. Payments form an append-only ledger from which
//! receivables and GST summaries are derived.

pub mod commands;
pub mod contribution;
pub mod db;
pub mod db_backup;
pub mod error;
mod migrations;
pub mod payout;
pub mod queries;
pub mod roles;
pub mod services;
pub mod state;
pub mod types;
pub mod util;

pub use error::{CommandError, ServiceError};
pub use state::AppState;
