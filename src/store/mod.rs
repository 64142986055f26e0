//! Persistence boundary.
//!
//! ARCHITECTURE
//! ============
//! Services talk to a `dyn Store` held in `AppState`. Two implementations:
//! - [`memory::MemoryStore`]: process-local maps; default when no
//!   `DATABASE_URL` is configured and the backing store for tests.
//! - [`postgres::PostgresStore`]: SQLx queries against the migrated schema.
//!
//! Uniqueness rules (user email, lesson slug, one progress row per learner
//! and lesson) are enforced by both backends and surface as
//! [`StoreError::Conflict`].

pub mod memory;
pub mod postgres;

use axum::http::StatusCode;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{
    Activity, ActivityTotals, Alert, Event, Lesson, ProgressPatch, ProgressRecord, UnknownVariant, User,
    UserCredentials,
};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(#[from] UnknownVariant),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "E_CONFLICT",
            Self::Database(_) => "E_DATABASE",
            Self::Corrupt(_) => "E_CORRUPT_ROW",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for health reporting (`memory`, `postgres`).
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> bool;

    // --- users + sessions ---------------------------------------------------

    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Case-insensitive lookup by email.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError>;

    async fn list_users(&self, offset: usize, limit: usize) -> Result<Vec<User>, StoreError>;

    async fn insert_session(&self, token_hash: &str, user_id: Uuid, expires_at: OffsetDateTime)
    -> Result<(), StoreError>;

    /// Resolve an unexpired session to its user.
    async fn session_user(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<User>, StoreError>;

    async fn delete_session(&self, token_hash: &str) -> Result<(), StoreError>;

    // --- lessons ------------------------------------------------------------

    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError>;

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError>;

    async fn get_lesson_by_slug(&self, slug: &str) -> Result<Option<Lesson>, StoreError>;

    /// All lessons, oldest first.
    async fn list_lessons(&self) -> Result<Vec<Lesson>, StoreError>;

    // --- progress -----------------------------------------------------------

    /// Create or patch the record for `(user_id, lesson_id)`.
    async fn upsert_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord, StoreError>;

    /// Records for one learner, most recently updated first.
    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError>;

    // --- activity -----------------------------------------------------------

    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError>;

    /// Newest first.
    async fn recent_activities(&self, user_id: &str, limit: usize) -> Result<Vec<Activity>, StoreError>;

    /// Scores of the most recent exercise evaluations, newest first.
    async fn recent_scores(&self, user_id: &str, limit: usize) -> Result<Vec<f64>, StoreError>;

    async fn activity_totals(&self, user_id: &str) -> Result<ActivityTotals, StoreError>;

    /// Distinct UTC dates with any activity, newest first.
    async fn active_days(&self, user_id: &str, limit: usize) -> Result<Vec<Date>, StoreError>;

    /// Drop a learner's history. Returns the number of removed entries.
    async fn clear_activities(&self, user_id: &str) -> Result<u64, StoreError>;

    // --- events + alerts ----------------------------------------------------

    async fn append_events(&self, events: &[Event]) -> Result<(), StoreError>;

    async fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError>;
}
