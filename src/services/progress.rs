//! Progress service: per-lesson records plus activity analytics.
//!
//! DESIGN
//! ======
//! Two sources feed a learner's picture:
//! - `ProgressRecord` rows, one per lesson, patched by explicit updates and
//!   by correct exercise evaluations.
//! - The activity log, from which the pure analytics in
//!   [`agents::progress`](crate::services::agents::progress) derive
//!   summaries, recommendations, and struggles.
//!
//! The dashboard view adds a day streak and achievement badges on top and
//! is the shape the front end renders.

use serde::Serialize;
use serde_json::json;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::models::{Activity, ActivityKind, ActivityTotals, EventTopic, ProgressPatch, ProgressRecord, ProgressStatus};
use crate::services::agents::progress::{self as analytics, ProgressReport, ProgressSnapshot, ProgressSummary, Recommendation};
use crate::state::AppState;
use crate::store::StoreError;

/// Recent history loaded for summaries.
const RECENT_LIMIT: usize = 5;
/// Evaluation scores considered for struggle detection.
const RECENT_SCORE_LIMIT: usize = 5;
/// Longest streak the dashboard will count.
const MAX_STREAK_DAYS: usize = 366;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProgress {
    pub user_id: String,
    pub summary: ProgressSummary,
    pub records: Vec<ProgressRecord>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
}

/// Front-end dashboard shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user_id: String,
    pub lessons_completed: usize,
    pub exercises_completed: u64,
    pub current_streak: usize,
    /// Minutes.
    pub total_time_spent: i64,
    pub achievements: Vec<&'static str>,
    pub progress: Vec<LessonProgress>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonProgress {
    pub lesson: String,
    pub completed: bool,
    pub score: Option<f64>,
}

// =============================================================================
// QUERIES
// =============================================================================

async fn load(state: &AppState, user_id: &str) -> Result<(ActivityTotals, Vec<Activity>), StoreError> {
    let totals = state.store.activity_totals(user_id).await?;
    let recent = state.store.recent_activities(user_id, RECENT_LIMIT).await?;
    Ok((totals, recent))
}

/// Summary and recommendations, as the progress agent consumes them.
pub async fn snapshot(state: &AppState, user_id: &str) -> Result<ProgressSnapshot, StoreError> {
    let (totals, recent) = load(state, user_id).await?;
    Ok(analytics::snapshot(user_id, &totals, &recent))
}

pub async fn get_user_progress(state: &AppState, user_id: &str) -> Result<UserProgress, StoreError> {
    let (totals, recent) = load(state, user_id).await?;
    let records = state.store.list_progress(user_id).await?;
    let last_updated = latest(records.iter().map(|r| r.updated_at).max(), totals.last_activity);
    Ok(UserProgress { user_id: user_id.to_string(), summary: analytics::summarize(user_id, &totals, &recent), records, last_updated })
}

pub async fn recommendations(state: &AppState, user_id: &str) -> Result<Vec<Recommendation>, StoreError> {
    let totals = state.store.activity_totals(user_id).await?;
    state.events.emit(
        EventTopic::UserInteractions,
        user_id,
        json!({ "type": "get_recommendations", "total_activities": totals.total }),
    );
    Ok(analytics::recommendations(&totals))
}

pub async fn report(state: &AppState, user_id: &str) -> Result<ProgressReport, StoreError> {
    let (totals, recent) = load(state, user_id).await?;
    let scores = state.store.recent_scores(user_id, RECENT_SCORE_LIMIT).await?;
    Ok(analytics::report(user_id, &totals, &recent, &scores))
}

pub async fn dashboard(state: &AppState, user_id: &str) -> Result<Dashboard, StoreError> {
    let totals = state.store.activity_totals(user_id).await?;
    let records = state.store.list_progress(user_id).await?;
    let days = state.store.active_days(user_id, MAX_STREAK_DAYS).await?;

    let lessons_completed = records.iter().filter(|r| r.status == ProgressStatus::Completed).count();
    let current_streak = streak(&days, OffsetDateTime::now_utc().date());
    let total_time_spent = records.iter().map(|r| r.time_spent).sum::<i64>() / 60;
    let last_updated = latest(records.iter().map(|r| r.updated_at).max(), totals.last_activity);

    let mut progress: Vec<LessonProgress> = records
        .iter()
        .map(|r| LessonProgress {
            lesson: r.lesson_id.clone(),
            completed: r.status == ProgressStatus::Completed,
            score: r.score,
        })
        .collect();
    progress.sort_by(|a, b| a.lesson.cmp(&b.lesson));

    Ok(Dashboard {
        user_id: user_id.to_string(),
        lessons_completed,
        exercises_completed: totals.completed_exercises,
        current_streak,
        total_time_spent,
        achievements: achievements(&totals, lessons_completed, current_streak),
        progress,
        last_updated,
    })
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// Patch one lesson record, log the activity, and publish the change.
pub async fn update_progress(
    state: &AppState,
    user_id: &str,
    lesson_id: &str,
    patch: &ProgressPatch,
) -> Result<ProgressRecord, StoreError> {
    let record = state.store.upsert_progress(user_id, lesson_id, patch).await?;
    let activity = Activity::new(user_id, ActivityKind::ProgressUpdate, &format!("lesson {lesson_id}: {}", record.status));
    if let Err(e) = state.store.insert_activity(&activity).await {
        warn!(error = %e, %user_id, "progress: activity insert failed");
    }
    state.events.emit(
        EventTopic::ProgressUpdates,
        user_id,
        json!({
            "lesson_id": lesson_id,
            "status": record.status,
            "score": record.score,
            "attempts": record.attempts,
        }),
    );
    info!(%user_id, %lesson_id, status = %record.status, "progress: updated");
    Ok(record)
}

/// Drop a learner's activity history. Lesson records are kept.
pub async fn reset(state: &AppState, user_id: &str) -> Result<u64, StoreError> {
    let removed = state.store.clear_activities(user_id).await?;
    info!(%user_id, removed, "progress: history reset");
    Ok(removed)
}

// =============================================================================
// HELPERS
// =============================================================================

fn latest(a: Option<OffsetDateTime>, b: Option<OffsetDateTime>) -> Option<OffsetDateTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Consecutive active days ending today or yesterday. `days` is newest first.
#[must_use]
pub fn streak(days: &[Date], today: Date) -> usize {
    let Some(&first) = days.first() else {
        return 0;
    };
    if first != today && first != today - Duration::days(1) {
        return 0;
    }
    let mut count = 1;
    for pair in days.windows(2) {
        if pair[0] - Duration::days(1) != pair[1] {
            break;
        }
        count += 1;
    }
    count
}

/// Badges earned so far, in a fixed display order.
#[must_use]
pub fn achievements(totals: &ActivityTotals, lessons_completed: usize, streak: usize) -> Vec<&'static str> {
    let mut out = Vec::new();
    if totals.total > 0 {
        out.push("First Steps");
    }
    if totals.count(ActivityKind::CodeDebug) > 0 {
        out.push("Bug Finder");
    }
    if totals.count(ActivityKind::CodeExecution) >= 10 {
        out.push("Code Warrior");
    }
    if lessons_completed >= 5 {
        out.push("Lesson Master");
    }
    if streak >= 3 {
        out.push("On a Roll");
    }
    if totals.evaluations >= 3 && totals.average_score().is_some_and(|avg| avg >= 90.0) {
        out.push("High Achiever");
    }
    out
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
