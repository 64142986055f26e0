//! Domain records shared by the store, services, and routes.
//!
//! DESIGN
//! ======
//! Records mirror the Postgres tables in `db/migrations`. Enumerations are
//! persisted as lowercase text, so each one carries `as_str` / `FromStr`
//! through the [`text_enum!`] macro and serializes with the same spelling.
//! Learner ids on progress and activity rows are free-form strings: the
//! tutoring front end identifies learners by opaque ids that are not
//! necessarily registered accounts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const PREVIEW_CHARS: usize = 100;

/// Define a string-backed enum with `as_str`, `FromStr`, and serde support.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: stringify!($name), value: raw.to_string() }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// A persisted enum column held a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

text_enum! {
    UserRole {
        Student => "student",
        Teacher => "teacher",
        Admin => "admin",
    }
}

text_enum! {
    Difficulty {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
    }
}

text_enum! {
    ProgressStatus {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

text_enum! {
    /// Which tutoring agent handled a request.
    AgentKind {
        Triage => "triage",
        Concepts => "concepts",
        CodeReview => "code_review",
        Debug => "debug",
        Exercise => "exercise",
        Progress => "progress",
    }
}

text_enum! {
    ActivityKind {
        TutorRequest => "tutor_request",
        CodeExecution => "code_execution",
        CodeReview => "code_review",
        CodeDebug => "code_debug",
        ExerciseEvaluation => "exercise_evaluation",
        ProgressUpdate => "progress_update",
    }
}

text_enum! {
    EventTopic {
        UserInteractions => "user_interactions",
        ProgressUpdates => "progress_updates",
        AiInteractions => "ai_interactions",
        TeacherAlerts => "teacher_alerts",
    }
}

text_enum! {
    Priority {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Account creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub password: String,
}

/// A user row together with its password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

// =============================================================================
// LESSONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub difficulty: Difficulty,
    pub category: String,
    /// Minutes.
    pub estimated_duration: i32,
    pub prerequisites: Vec<String>,
    pub objectives: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLesson {
    #[serde(default)]
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
    pub estimated_duration: Option<i32>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
}

// =============================================================================
// PROGRESS
// =============================================================================

/// One learner's standing on one lesson. Unique per `(user_id, lesson_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: Uuid,
    pub user_id: String,
    pub lesson_id: String,
    pub status: ProgressStatus,
    pub score: Option<f64>,
    /// Seconds.
    pub time_spent: i64,
    pub attempts: i32,
    pub metadata: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Partial progress update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressPatch {
    pub status: Option<ProgressStatus>,
    pub score: Option<f64>,
    pub time_spent: Option<i64>,
    pub attempts: Option<i32>,
    pub metadata: Option<serde_json::Value>,
    /// Bump `attempts` by one instead of overwriting it.
    #[serde(skip)]
    pub increment_attempts: bool,
}

impl ProgressRecord {
    #[must_use]
    pub fn new(user_id: &str, lesson_id: &str, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
            status: ProgressStatus::NotStarted,
            score: None,
            time_spent: 0,
            attempts: 0,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch into this record. Metadata objects merge key-by-key.
    pub fn apply(&mut self, patch: &ProgressPatch, now: OffsetDateTime) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(score) = patch.score {
            self.score = Some(score);
        }
        if let Some(time_spent) = patch.time_spent {
            self.time_spent = time_spent.max(0);
        }
        if let Some(attempts) = patch.attempts {
            self.attempts = attempts.max(0);
        }
        if patch.increment_attempts {
            self.attempts = self.attempts.saturating_add(1);
        }
        if let Some(metadata) = &patch.metadata {
            merge_metadata(&mut self.metadata, metadata);
        }
        self.updated_at = now;
    }
}

fn merge_metadata(target: &mut serde_json::Value, incoming: &serde_json::Value) {
    match (target.as_object_mut(), incoming.as_object()) {
        (Some(existing), Some(update)) => {
            for (key, value) in update {
                existing.insert(key.clone(), value.clone());
            }
        }
        _ => *target = incoming.clone(),
    }
}

// =============================================================================
// ACTIVITY
// =============================================================================

/// One entry in a learner's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: String,
    pub kind: ActivityKind,
    pub agent: Option<AgentKind>,
    pub success: Option<bool>,
    pub score: Option<f64>,
    pub summary: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Activity {
    #[must_use]
    pub fn new(user_id: &str, kind: ActivityKind, summary: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind,
            agent: None,
            success: None,
            score: None,
            summary: preview(summary),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn with_agent(mut self, agent: AgentKind) -> Self {
        self.agent = Some(agent);
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, success: bool, score: Option<f64>) -> Self {
        self.success = Some(success);
        self.score = score;
        self
    }

    /// An exercise evaluation the learner passed.
    #[must_use]
    pub fn is_completed_exercise(&self) -> bool {
        self.kind == ActivityKind::ExerciseEvaluation && self.success == Some(true)
    }
}

/// Aggregates over a learner's activity log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityTotals {
    pub total: u64,
    pub completed_exercises: u64,
    pub evaluations: u64,
    pub score_sum: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_activity: Option<OffsetDateTime>,
    pub by_kind: BTreeMap<ActivityKind, u64>,
}

impl ActivityTotals {
    /// Fold one activity into the totals.
    pub fn record(&mut self, activity: &Activity) {
        self.total += 1;
        *self.by_kind.entry(activity.kind).or_default() += 1;
        if activity.kind == ActivityKind::ExerciseEvaluation {
            if let Some(score) = activity.score {
                self.evaluations += 1;
                self.score_sum += score;
            }
        }
        if activity.is_completed_exercise() {
            self.completed_exercises += 1;
        }
        if self.last_activity.is_none_or(|last| activity.created_at > last) {
            self.last_activity = Some(activity.created_at);
        }
    }

    /// Mean evaluation score, or `None` before any evaluation.
    #[must_use]
    pub fn average_score(&self) -> Option<f64> {
        if self.evaluations == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.score_sum / self.evaluations as f64)
    }

    #[must_use]
    pub fn count(&self, kind: ActivityKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

// =============================================================================
// EVENTS + ALERTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub topic: EventTopic,
    pub user_id: String,
    pub payload: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Event {
    #[must_use]
    pub fn new(topic: EventTopic, user_id: &str, payload: serde_json::Value) -> Self {
        Self { id: Uuid::new_v4(), topic, user_id: user_id.to_string(), payload, created_at: OffsetDateTime::now_utc() }
    }
}

/// Notice raised for teachers when a learner appears stuck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub reason: String,
    pub severity: Priority,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// HELPERS
// =============================================================================

/// Truncate free text to a short preview, appending `...` when cut.
#[must_use]
pub fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
