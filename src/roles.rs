//! Role-based permission matrix.
//!
//! Session handling lives outside this crate; callers pass the acting user's
//! id and this module decides what that user may do.

use crate::db::{DbUser, LedgerDb};
use crate::error::ServiceError;
use crate::types::{Role, UserStatus};

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageUsers,
    ManageFunds,
    ManageGroups,
    ManageMembers,
    RecordPayment,
    ViewLedger,
    ViewOwnLedger,
    PreviewPayout,
    ProcessPayout,
    Reporting,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage users",
            Permission::ManageFunds => "manage funds",
            Permission::ManageGroups => "manage groups",
            Permission::ManageMembers => "manage fund members",
            Permission::RecordPayment => "record payments",
            Permission::ViewLedger => "view the ledger",
            Permission::ViewOwnLedger => "view own ledger",
            Permission::PreviewPayout => "preview payouts",
            Permission::ProcessPayout => "process payouts",
            Permission::Reporting => "run reports",
        }
    }
}

/// Whether a role grants a permission.
pub fn allows(role: Role, permission: Permission) -> bool {
    match role {
        Role::Admin => true,
        Role::Agent => matches!(
            permission,
            Permission::RecordPayment
                | Permission::ViewLedger
                | Permission::ViewOwnLedger
                | Permission::PreviewPayout
        ),
        Role::Member => matches!(permission, Permission::ViewOwnLedger),
    }
}

/// Load the acting user and check the permission. Inactive users are refused
/// everything.
pub fn authorize(db: &LedgerDb, actor_id: &str, permission: Permission) -> Result<DbUser, ServiceError> {
    let actor = db
        .get_user(actor_id)?
        .ok_or_else(|| ServiceError::Forbidden(format!("unknown user {actor_id}")))?;

    if actor.status != UserStatus::Active {
        log::warn!("Refused {} for inactive user {}", permission.as_str(), actor.id);
        return Err(ServiceError::Forbidden(format!(
            "user {} is inactive",
            actor.id
        )));
    }

    if !allows(actor.role, permission) {
        log::warn!(
            "Refused {} for {} ({})",
            permission.as_str(),
            actor.id,
            actor.role
        );
        return Err(ServiceError::Forbidden(format!(
            "{} may not {}",
            actor.role,
            permission.as_str()
        )));
    }

    Ok(actor)
}

/// Allow access to a user's own records, or to anyone's with `ViewLedger`.
pub fn authorize_self_or(
    db: &LedgerDb,
    actor_id: &str,
    subject_user_id: &str,
) -> Result<DbUser, ServiceError> {
    if actor_id == subject_user_id {
        authorize(db, actor_id, Permission::ViewOwnLedger)
    } else {
        authorize(db, actor_id, Permission::ViewLedger)
    }
}
