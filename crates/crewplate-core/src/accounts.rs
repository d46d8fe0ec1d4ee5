use anyhow::anyhow;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;
use tracing::{info, warn};
use uuid::Uuid;

use crewplate_db::Database;
use crewplate_db::models::{UserRow, now_timestamp};
use crewplate_types::models::User;

use crate::convert;
use crate::error::{CoreError, Result};

/// Registration, credential checks and profile edits.
///
/// Credentials are only checked for presence; strength rules are left to
/// whoever fronts the API.
pub struct Accounts<'a> {
    db: &'a Database,
}

fn required<'s>(field: &str, value: &'s str) -> Result<&'s str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::validation(format!("{} must not be empty", field)));
    }
    Ok(value)
}

fn normalize_email(email: &str) -> Result<String> {
    Ok(required("email", email)?.to_lowercase())
}

impl<'a> Accounts<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn register(&self, email: &str, password: &str, display_name: &str) -> Result<User> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(CoreError::validation("password must not be empty"));
        }
        let display_name = required("display_name", display_name)?;

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CoreError::Storage(anyhow!("Password hashing failed: {}", e)))?
            .to_string();

        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            email,
            password: password_hash,
            display_name: display_name.to_string(),
            icon: None,
            created_at: now_timestamp(),
        };
        if !self.db.create_user(&row)? {
            return Err(CoreError::Conflict("email already registered"));
        }

        info!("Registered user {} ({})", row.id, row.display_name);
        convert::user(row)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(CoreError::validation("password must not be empty"));
        }

        let Some(row) = self.db.get_user_by_email(&email)? else {
            return Err(CoreError::InvalidCredentials);
        };

        let parsed = PasswordHash::new(&row.password)
            .map_err(|e| CoreError::Storage(anyhow!("Corrupt password hash for {}: {}", row.id, e)))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            warn!("Failed login for {}", row.id);
            return Err(CoreError::InvalidCredentials);
        }

        convert::user(row)
    }

    pub fn profile(&self, user_id: Uuid) -> Result<User> {
        let row = self
            .db
            .get_user_by_id(&user_id.to_string())?
            .ok_or(CoreError::NotFound("user"))?;
        convert::user(row)
    }

    /// `None` leaves a field unchanged. A blank display name is rejected; a
    /// blank icon is stored as given.
    pub fn update_profile(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        icon: Option<&str>,
    ) -> Result<User> {
        let display_name = display_name
            .map(|name| required("display_name", name))
            .transpose()?;

        if !self
            .db
            .update_user_profile(&user_id.to_string(), display_name, icon)?
        {
            return Err(CoreError::NotFound("user"));
        }
        self.profile(user_id)
    }
}
