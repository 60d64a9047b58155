// Users service: creation, self-registration and admin role/status changes.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;

use crate::db::{DbUser, LedgerDb};
use crate::error::ServiceError;
use crate::types::{Role, UserStatus};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

/// Create a user with any role (admin operation).
pub fn create_user(db: &LedgerDb, new: &NewUser) -> Result<DbUser, ServiceError> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("name is required".to_string()));
    }
    let email = new.email.trim().to_lowercase();
    if !email_pattern().is_match(&email) {
        return Err(ServiceError::Validation(format!(
            "'{}' is not a valid email address",
            new.email
        )));
    }
    if db.get_user_by_email(&email)?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "a user with email {email} already exists"
        )));
    }

    let now = Utc::now().to_rfc3339();
    let user = DbUser {
        id: crate::util::new_id("usr"),
        name: name.to_string(),
        email,
        phone: normalize_phone(new.phone.as_deref()),
        role: new.role,
        status: UserStatus::Active,
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_user(&user)?;
    log::info!("Created {} user {}", user.role, user.id);
    Ok(user)
}

/// Self-registration always yields an active member.
pub fn register_member(
    db: &LedgerDb,
    name: &str,
    email: &str,
    phone: Option<&str>,
) -> Result<DbUser, ServiceError> {
    create_user(
        db,
        &NewUser {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
            role: Role::Member,
        },
    )
}

/// Create the first admin of an empty ledger. Refused once any admin exists.
pub fn bootstrap_admin(db: &LedgerDb, name: &str, email: &str) -> Result<DbUser, ServiceError> {
    if !db.list_users(Some(Role::Admin))?.is_empty() {
        return Err(ServiceError::Conflict("an admin already exists".to_string()));
    }
    create_user(
        db,
        &NewUser {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            role: Role::Admin,
        },
    )
}

pub fn get_user(db: &LedgerDb, id: &str) -> Result<DbUser, ServiceError> {
    db.get_user(id)?
        .ok_or_else(|| ServiceError::not_found("User", id))
}

/// Refuse changes that would leave no active admin.
fn ensure_other_active_admin(db: &LedgerDb, user: &DbUser) -> Result<(), ServiceError> {
    if user.role != Role::Admin || user.status != UserStatus::Active {
        return Ok(());
    }
    let others = db
        .list_users(Some(Role::Admin))?
        .into_iter()
        .filter(|u| u.id != user.id && u.status == UserStatus::Active)
        .count();
    if others == 0 {
        return Err(ServiceError::Conflict(
            "at least one active admin must remain".to_string(),
        ));
    }
    Ok(())
}

pub fn set_user_role(db: &LedgerDb, id: &str, role: Role) -> Result<DbUser, ServiceError> {
    let user = get_user(db, id)?;
    if user.role == role {
        return Ok(user);
    }
    ensure_other_active_admin(db, &user)?;
    db.update_user_role(id, role)?;
    log::info!("User {} role {} -> {}", id, user.role, role);
    get_user(db, id)
}

pub fn set_user_status(
    db: &LedgerDb,
    id: &str,
    status: UserStatus,
) -> Result<DbUser, ServiceError> {
    let user = get_user(db, id)?;
    if user.status == status {
        return Ok(user);
    }
    if status == UserStatus::Inactive {
        ensure_other_active_admin(db, &user)?;
    }
    db.update_user_status(id, status)?;
    log::info!("User {} status {} -> {}", id, user.status, status);
    get_user(db, id)
}
