//! Login sessions.
//!
//! DESIGN
//! ======
//! The client holds a random 32-byte hex token; the store only ever sees
//! its SHA-256. A leaked sessions table therefore cannot be replayed.
//! Expiry is checked by the store on lookup.

use std::fmt::Write;

use rand::Rng;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::models::User;
use crate::store::{Store, StoreError};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Hex SHA-256 of a session token, as stored.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Create a session for `user_id`, returning the plaintext token.
pub async fn create_session(store: &dyn Store, user_id: Uuid, ttl_hours: i64) -> Result<String, StoreError> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::hours(ttl_hours);
    store.insert_session(&hash_token(&token), user_id, expires_at).await?;
    Ok(token)
}

/// Resolve a token to its user, if the session exists and has not expired.
pub async fn validate_session(store: &dyn Store, token: &str) -> Result<Option<User>, StoreError> {
    if token.is_empty() {
        return Ok(None);
    }
    store.session_user(&hash_token(token), OffsetDateTime::now_utc()).await
}

pub async fn delete_session(store: &dyn Store, token: &str) -> Result<(), StoreError> {
    store.delete_session(&hash_token(token)).await
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
