//! `PostgreSQL` store backed by the schema in `db/migrations`.
//!
//! ERROR HANDLING
//! ==============
//! Unique-constraint violations become [`StoreError::Conflict`] so callers can
//! answer 409 without inspecting driver errors. Enum columns that fail to
//! parse surface as [`StoreError::Corrupt`] rather than being skipped.

use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    Activity, ActivityKind, ActivityTotals, AgentKind, Alert, Difficulty, Event, Lesson, Priority, ProgressPatch,
    ProgressRecord, ProgressStatus, User, UserCredentials, UserRole,
};

const USER_COLUMNS: &str = "id, email, first_name, last_name, role, created_at, updated_at";
const LESSON_COLUMNS: &str = "id, slug, title, description, content, difficulty, category, estimated_duration, \
                              prerequisites, objectives, created_at, updated_at";
const PROGRESS_COLUMNS: &str =
    "id, user_id, lesson_id, status, score, time_spent, attempts, metadata, created_at, updated_at";
const ACTIVITY_COLUMNS: &str = "id, user_id, kind, agent, success, score, summary, created_at";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn conflict_or(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what()),
        other => StoreError::Database(other),
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// =============================================================================
// ROW DECODING
// =============================================================================

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role: UserRole::from_str(&role)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn lesson_from_row(row: &PgRow) -> Result<Lesson, StoreError> {
    let difficulty: String = row.try_get("difficulty")?;
    let Json(prerequisites): Json<Vec<String>> = row.try_get("prerequisites")?;
    let Json(objectives): Json<Vec<String>> = row.try_get("objectives")?;
    Ok(Lesson {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        content: row.try_get("content")?,
        difficulty: Difficulty::from_str(&difficulty)?,
        category: row.try_get("category")?,
        estimated_duration: row.try_get("estimated_duration")?,
        prerequisites,
        objectives,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn progress_from_row(row: &PgRow) -> Result<ProgressRecord, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(ProgressRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        lesson_id: row.try_get("lesson_id")?,
        status: ProgressStatus::from_str(&status)?,
        score: row.try_get("score")?,
        time_spent: row.try_get("time_spent")?,
        attempts: row.try_get("attempts")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn activity_from_row(row: &PgRow) -> Result<Activity, StoreError> {
    let kind: String = row.try_get("kind")?;
    let agent: Option<String> = row.try_get("agent")?;
    Ok(Activity {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: ActivityKind::from_str(&kind)?,
        agent: agent.as_deref().map(AgentKind::from_str).transpose()?,
        success: row.try_get("success")?,
        score: row.try_get("score")?,
        summary: row.try_get("summary")?,
        created_at: row.try_get("created_at")?,
    })
}

fn alert_from_row(row: &PgRow) -> Result<Alert, StoreError> {
    let severity: String = row.try_get("severity")?;
    Ok(Alert {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: row.try_get("kind")?,
        reason: row.try_get("reason")?,
        severity: Priority::from_str(&severity)?,
        created_at: row.try_get("created_at")?,
    })
}

// =============================================================================
// STORE IMPL
// =============================================================================

#[async_trait::async_trait]
impl Store for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, first_name, last_name, role, password_hash, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, || format!("user with email {}", user.email)))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE lower(email) = lower($1)"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserCredentials { user: user_from_row(&row)?, password_hash: row.try_get("password_hash")? }))
    }

    async fn list_users(&self, offset: usize, limit: usize) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, email OFFSET $1 LIMIT $2"
        ))
        .bind(to_i64(offset))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn session_user(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT u.id, u.email, u.first_name, u.last_name, u.role, u.created_at, u.updated_at
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = $1 AND s.expires_at > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO lessons (id, slug, title, description, content, difficulty, category,
                                  estimated_duration, prerequisites, objectives, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(lesson.id)
        .bind(&lesson.slug)
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.content)
        .bind(lesson.difficulty.as_str())
        .bind(&lesson.category)
        .bind(lesson.estimated_duration)
        .bind(Json(&lesson.prerequisites))
        .bind(Json(&lesson.objectives))
        .bind(lesson.created_at)
        .bind(lesson.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, || format!("lesson with slug {}", lesson.slug)))?;
        Ok(())
    }

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError> {
        let row = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    async fn get_lesson_by_slug(&self, slug: &str) -> Result<Option<Lesson>, StoreError> {
        let row = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    async fn list_lessons(&self) -> Result<Vec<Lesson>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons ORDER BY created_at, slug"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(lesson_from_row).collect()
    }

    async fn upsert_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;

        // PHASE: ENSURE THE ROW EXISTS, THEN LOCK IT
        let fresh = ProgressRecord::new(user_id, lesson_id, now);
        sqlx::query(
            "INSERT INTO progress (id, user_id, lesson_id, status, score, time_spent, attempts, metadata,
                                   created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (user_id, lesson_id) DO NOTHING",
        )
        .bind(fresh.id)
        .bind(&fresh.user_id)
        .bind(&fresh.lesson_id)
        .bind(fresh.status.as_str())
        .bind(fresh.score)
        .bind(fresh.time_spent)
        .bind(fresh.attempts)
        .bind(&fresh.metadata)
        .bind(fresh.created_at)
        .bind(fresh.updated_at)
        .execute(tx.as_mut())
        .await?;

        // PHASE: READ UNDER LOCK, MERGE IN RUST
        let row = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM progress WHERE user_id = $1 AND lesson_id = $2 FOR UPDATE"
        ))
        .bind(user_id)
        .bind(lesson_id)
        .fetch_one(tx.as_mut())
        .await?;
        let mut record = progress_from_row(&row)?;
        record.apply(patch, now);

        // PHASE: WRITE BACK
        sqlx::query(
            "UPDATE progress SET status = $2, score = $3, time_spent = $4, attempts = $5, metadata = $6,
                                 updated_at = $7
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(record.score)
        .bind(record.time_spent)
        .bind(record.attempts)
        .bind(&record.metadata)
        .bind(record.updated_at)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM progress WHERE user_id = $1 ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(progress_from_row).collect()
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO activities (id, user_id, kind, agent, success, score, summary, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(activity.id)
        .bind(&activity.user_id)
        .bind(activity.kind.as_str())
        .bind(activity.agent.map(AgentKind::as_str))
        .bind(activity.success)
        .bind(activity.score)
        .bind(&activity.summary)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_activities(&self, user_id: &str, limit: usize) -> Result<Vec<Activity>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(activity_from_row).collect()
    }

    async fn recent_scores(&self, user_id: &str, limit: usize) -> Result<Vec<f64>, StoreError> {
        let rows = sqlx::query(
            "SELECT score FROM activities
             WHERE user_id = $1 AND kind = $2 AND score IS NOT NULL
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(user_id)
        .bind(ActivityKind::ExerciseEvaluation.as_str())
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<f64, _>("score").map_err(StoreError::from))
            .collect()
    }

    async fn activity_totals(&self, user_id: &str) -> Result<ActivityTotals, StoreError> {
        let rows = sqlx::query(
            "SELECT kind,
                    count(*) AS total,
                    count(*) FILTER (WHERE success IS TRUE) AS succeeded,
                    count(score) AS scored,
                    coalesce(sum(score), 0) AS score_sum,
                    max(created_at) AS last_at
             FROM activities WHERE user_id = $1 GROUP BY kind",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = ActivityTotals::default();
        for row in &rows {
            let kind = ActivityKind::from_str(&row.try_get::<String, _>("kind")?)?;
            let count = u64::try_from(row.try_get::<i64, _>("total")?).unwrap_or(0);
            let last_at: Option<OffsetDateTime> = row.try_get("last_at")?;
            totals.total += count;
            totals.by_kind.insert(kind, count);
            if kind == ActivityKind::ExerciseEvaluation {
                totals.completed_exercises = u64::try_from(row.try_get::<i64, _>("succeeded")?).unwrap_or(0);
                totals.evaluations = u64::try_from(row.try_get::<i64, _>("scored")?).unwrap_or(0);
                totals.score_sum = row.try_get("score_sum")?;
            }
            if last_at > totals.last_activity {
                totals.last_activity = last_at;
            }
        }
        Ok(totals)
    }

    async fn active_days(&self, user_id: &str, limit: usize) -> Result<Vec<Date>, StoreError> {
        let rows = sqlx::query(
            "SELECT DISTINCT (created_at AT TIME ZONE 'UTC')::date AS day
             FROM activities WHERE user_id = $1 ORDER BY day DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<Date, _>("day").map_err(StoreError::from))
            .collect()
    }

    async fn clear_activities(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM activities WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_events(&self, events: &[Event]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for event in events {
            sqlx::query("INSERT INTO events (id, topic, user_id, payload, created_at) VALUES ($1, $2, $3, $4, $5)")
                .bind(event.id)
                .bind(event.topic.as_str())
                .bind(&event.user_id)
                .bind(&event.payload)
                .bind(event.created_at)
                .execute(tx.as_mut())
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO alerts (id, user_id, kind, reason, severity, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(alert.id)
        .bind(&alert.user_id)
        .bind(&alert.kind)
        .bind(&alert.reason)
        .bind(alert.severity.as_str())
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, kind, reason, severity, created_at FROM alerts ORDER BY created_at DESC LIMIT $1",
        )
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(alert_from_row).collect()
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
