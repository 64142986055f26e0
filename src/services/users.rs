//! Accounts: creation, lookup, password login.
//!
//! Passwords are stored only as argon2id PHC strings. Login failures do not
//! say whether the email or the password was wrong.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use axum::http::StatusCode;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{NewUser, User, UserRole};
use crate::store::{Store, StoreError};

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_NAME_CHARS: usize = 100;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: &'static str },
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for UserError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "E_INVALID_FIELD",
            Self::NotFound(_) => "E_USER_NOT_FOUND",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Hash(_) => "E_PASSWORD_HASH",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Invalid { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(e) => e.status(),
        }
    }
}

/// Trimmed, lowercased email, or `None` when it cannot be an address.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_ascii_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return None;
    }
    Some(email)
}

fn validate_name(field: &'static str, value: &str) -> Result<String, UserError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(UserError::Invalid { field, reason: "must not be empty" });
    }
    if value.chars().count() > MAX_NAME_CHARS {
        return Err(UserError::Invalid { field, reason: "must be at most 100 characters" });
    }
    Ok(value.to_string())
}

pub fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::Hash(e.to_string()))
}

#[must_use]
pub fn verify_password(password: &str, phc: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_password`] on the blocking pool.
async fn hash_in_background(password: String) -> Result<String, UserError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| UserError::Hash(e.to_string()))?
}

/// [`verify_password`] on the blocking pool.
async fn verify_in_background(password: String, phc: String) -> Result<bool, UserError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &phc))
        .await
        .map_err(|e| UserError::Hash(e.to_string()))
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Validate and insert a new account.
///
/// # Errors
///
/// `Invalid` for bad input, `Store(Conflict)` for a taken email.
pub async fn create(store: &dyn Store, input: NewUser) -> Result<User, UserError> {
    let email = normalize_email(&input.email).ok_or(UserError::Invalid { field: "email", reason: "not an email address" })?;
    let first_name = validate_name("first_name", &input.first_name)?;
    let last_name = validate_name("last_name", &input.last_name)?;
    if input.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(UserError::Invalid { field: "password", reason: "must be at least 8 characters" });
    }

    let password_hash = hash_in_background(input.password).await?;
    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        email,
        first_name,
        last_name,
        role: input.role.unwrap_or(UserRole::Student),
        created_at: now,
        updated_at: now,
    };
    store.insert_user(&user, &password_hash).await?;
    info!(user_id = %user.id, role = %user.role, "users: created");
    Ok(user)
}

pub async fn get(store: &dyn Store, id: Uuid) -> Result<User, UserError> {
    store.get_user(id).await?.ok_or(UserError::NotFound(id))
}

/// A page of users, oldest first. `limit` is clamped to [`MAX_PAGE_SIZE`].
pub async fn list(store: &dyn Store, skip: usize, limit: usize) -> Result<Vec<User>, UserError> {
    Ok(store.list_users(skip, limit.clamp(1, MAX_PAGE_SIZE)).await?)
}

/// Check a password and return the account.
///
/// # Errors
///
/// `InvalidCredentials` for an unknown email or a wrong password.
pub async fn authenticate(store: &dyn Store, email: &str, password: &str) -> Result<User, UserError> {
    let email = normalize_email(email).ok_or(UserError::InvalidCredentials)?;
    let credentials = store
        .find_credentials(&email)
        .await?
        .ok_or(UserError::InvalidCredentials)?;
    if !verify_in_background(password.to_string(), credentials.password_hash).await? {
        return Err(UserError::InvalidCredentials);
    }
    Ok(credentials.user)
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
