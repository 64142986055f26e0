//! In-memory store.
//!
//! Single `RwLock` over plain collections. Activity history and the event
//! log are append-only and both capped, oldest entries dropped first, so a
//! long-running process without a database stays bounded.

use std::collections::{BTreeSet, HashMap, VecDeque};

use time::{Date, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    Activity, ActivityKind, ActivityTotals, Alert, Event, Lesson, ProgressPatch, ProgressRecord, User,
    UserCredentials,
};

const MAX_RETAINED_EVENTS: usize = 10_000;
const MAX_RETAINED_ACTIVITIES: usize = 100_000;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserCredentials>,
    sessions: HashMap<String, (Uuid, OffsetDateTime)>,
    lessons: Vec<Lesson>,
    progress: HashMap<(String, String), ProgressRecord>,
    activities: VecDeque<Activity>,
    events: Vec<Event>,
    alerts: Vec<Alert>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
    activity_cap: usize,
    /// Number of upcoming `append_events` calls that fail.
    #[cfg(test)]
    append_failures: std::sync::atomic::AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: RwLock::default(),
            activity_cap: MAX_RETAINED_ACTIVITIES,
            #[cfg(test)]
            append_failures: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_activity_cap(activity_cap: usize) -> Self {
        Self { activity_cap, ..Self::default() }
    }

    /// Make the next `count` event appends fail with a database error.
    #[cfg(test)]
    pub(crate) fn fail_next_appends(&self, count: usize) {
        self.append_failures.store(count, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of retained events (test and diagnostics helper).
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.events.len()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let taken = inner
            .users
            .values()
            .any(|c| c.user.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(StoreError::Conflict(format!("user with email {}", user.email)));
        }
        inner
            .users
            .insert(user.id, UserCredentials { user: user.clone(), password_hash: password_hash.to_string() });
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .get(&id)
            .map(|c| c.user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|c| c.user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self, offset: usize, limit: usize) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().map(|c| c.user.clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.email.cmp(&b.email)));
        Ok(users.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .sessions
            .insert(token_hash.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn session_user(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        let Some((user_id, expires_at)) = inner.sessions.get(token_hash) else {
            return Ok(None);
        };
        if *expires_at <= now {
            return Ok(None);
        }
        Ok(inner.users.get(user_id).map(|c| c.user.clone()))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        self.inner.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.lessons.iter().any(|l| l.slug == lesson.slug) {
            return Err(StoreError::Conflict(format!("lesson with slug {}", lesson.slug)));
        }
        inner.lessons.push(lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.lessons.iter().find(|l| l.id == id).cloned())
    }

    async fn get_lesson_by_slug(&self, slug: &str) -> Result<Option<Lesson>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.lessons.iter().find(|l| l.slug == slug).cloned())
    }

    async fn list_lessons(&self) -> Result<Vec<Lesson>, StoreError> {
        Ok(self.inner.read().await.lessons.clone())
    }

    async fn upsert_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.inner.write().await;
        let record = inner
            .progress
            .entry((user_id.to_string(), lesson_id.to_string()))
            .or_insert_with(|| ProgressRecord::new(user_id, lesson_id, now));
        record.apply(patch, now);
        Ok(record.clone())
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut records: Vec<ProgressRecord> = inner
            .progress
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.activities.push_back(activity.clone());
        while inner.activities.len() > self.activity_cap {
            inner.activities.pop_front();
        }
        Ok(())
    }

    async fn recent_activities(&self, user_id: &str, limit: usize) -> Result<Vec<Activity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .activities
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_scores(&self, user_id: &str, limit: usize) -> Result<Vec<f64>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .activities
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id && a.kind == ActivityKind::ExerciseEvaluation)
            .filter_map(|a| a.score)
            .take(limit)
            .collect())
    }

    async fn activity_totals(&self, user_id: &str) -> Result<ActivityTotals, StoreError> {
        let inner = self.inner.read().await;
        let mut totals = ActivityTotals::default();
        for activity in inner.activities.iter().filter(|a| a.user_id == user_id) {
            totals.record(activity);
        }
        Ok(totals)
    }

    async fn active_days(&self, user_id: &str, limit: usize) -> Result<Vec<Date>, StoreError> {
        let inner = self.inner.read().await;
        let days: BTreeSet<Date> = inner
            .activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.created_at.date())
            .collect();
        Ok(days.into_iter().rev().take(limit).collect())
    }

    async fn clear_activities(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.activities.len();
        inner.activities.retain(|a| a.user_id != user_id);
        Ok((before - inner.activities.len()) as u64)
    }

    async fn append_events(&self, events: &[Event]) -> Result<(), StoreError> {
        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            if self.append_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
        }
        let mut inner = self.inner.write().await;
        inner.events.extend_from_slice(events);
        if inner.events.len() > MAX_RETAINED_EVENTS {
            let excess = inner.events.len() - MAX_RETAINED_EVENTS;
            inner.events.drain(..excess);
        }
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        self.inner.write().await.alerts.push(alert.clone());
        Ok(())
    }

    async fn list_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.alerts.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
