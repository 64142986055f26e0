//! Progress agent: learner analytics as pure functions.
//!
//! Everything here works on [`ActivityTotals`] and recent history already
//! loaded from the store, so the rules are testable without a backend. The
//! progress service does the loading; the router only ever sees a
//! preloaded [`ProgressSnapshot`].

use serde::Serialize;
use time::OffsetDateTime;

use super::{AgentKind, AgentReply, ReplyPayload};
use crate::models::{Activity, ActivityTotals, Priority};

const RECENT_ACTIVITY_LIMIT: usize = 5;
const STRUGGLE_WINDOW: usize = 5;
const STRUGGLE_MIN_EVALUATIONS: usize = 3;
const LOW_SCORE: f64 = 50.0;
const FOUNDATION_EXERCISES: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Engagement {
    New,
    Low,
    Medium,
    High,
}

impl Engagement {
    #[must_use]
    pub fn from_activity_count(total: u64) -> Self {
        match total {
            0 => Self::New,
            t if t > 20 => Self::High,
            t if t > 5 => Self::Medium,
            _ => Self::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub user_id: String,
    pub total_activities: u64,
    pub completed_exercises: u64,
    /// Mean exercise score, 0 before any evaluation.
    pub overall_score: f64,
    pub engagement_level: Engagement,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_activity: Option<OffsetDateTime>,
    pub recent_activities: Vec<Activity>,
    pub progress_percentage: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Curriculum,
    Practice,
    Advance,
    Challenge,
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub title: &'static str,
    pub description: &'static str,
    pub suggested_exercises: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StruggleKind {
    RepeatedFailure,
    SlowProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Struggle {
    #[serde(rename = "type")]
    pub kind: StruggleKind,
    pub severity: Priority,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

/// What the progress agent needs to answer a learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub summary: ProgressSummary,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub user_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub summary: ProgressSummary,
    pub recommendations: Vec<Recommendation>,
    pub struggles: Vec<Struggle>,
    pub action_items: Vec<Recommendation>,
}

// =============================================================================
// ANALYTICS
// =============================================================================

/// `recent` is newest first; only the first five are kept.
#[must_use]
pub fn summarize(user_id: &str, totals: &ActivityTotals, recent: &[Activity]) -> ProgressSummary {
    ProgressSummary {
        user_id: user_id.to_string(),
        total_activities: totals.total,
        completed_exercises: totals.completed_exercises,
        overall_score: totals.average_score().unwrap_or(0.0),
        engagement_level: Engagement::from_activity_count(totals.total),
        last_activity: totals.last_activity,
        recent_activities: recent.iter().take(RECENT_ACTIVITY_LIMIT).cloned().collect(),
        progress_percentage: totals.completed_exercises.saturating_mul(10).min(100),
    }
}

#[must_use]
pub fn recommendations(totals: &ActivityTotals) -> Vec<Recommendation> {
    if totals.total == 0 {
        return vec![Recommendation {
            kind: RecommendationKind::Curriculum,
            priority: Priority::High,
            title: "Start with Basics",
            description: "Begin with fundamental Python concepts",
            suggested_exercises: &["Print Statement", "Variable Assignment"],
        }];
    }

    let average = totals.average_score().unwrap_or(0.0);
    let mut out = vec![if average < 60.0 {
        Recommendation {
            kind: RecommendationKind::Practice,
            priority: Priority::High,
            title: "More Practice Needed",
            description: "Focus on strengthening fundamentals before advancing",
            suggested_exercises: &["Even or Odd", "Sum of Numbers"],
        }
    } else if average < 80.0 {
        Recommendation {
            kind: RecommendationKind::Advance,
            priority: Priority::Medium,
            title: "Ready for Next Level",
            description: "You're ready to tackle more challenging exercises",
            suggested_exercises: &["Simple Function"],
        }
    } else {
        Recommendation {
            kind: RecommendationKind::Challenge,
            priority: Priority::High,
            title: "Advanced Exercises",
            description: "Try more complex problems to continue growing",
            suggested_exercises: &["Advanced Function Problems"],
        }
    }];

    if totals.completed_exercises < FOUNDATION_EXERCISES {
        out.push(Recommendation {
            kind: RecommendationKind::Completion,
            priority: Priority::High,
            title: "Complete Foundational Exercises",
            description: "Finish the basic exercises to build a strong foundation",
            suggested_exercises: &["Print Statement", "Variable Assignment", "Even or Odd"],
        });
    }
    out
}

/// `recent_scores` are exercise scores, newest first.
#[must_use]
pub fn detect_struggles(totals: &ActivityTotals, recent_scores: &[f64]) -> Vec<Struggle> {
    let mut out = Vec::new();

    let window = &recent_scores[..recent_scores.len().min(STRUGGLE_WINDOW)];
    if window.len() >= STRUGGLE_MIN_EVALUATIONS && window.iter().filter(|s| **s < LOW_SCORE).count() >= 2 {
        out.push(Struggle {
            kind: StruggleKind::RepeatedFailure,
            severity: Priority::High,
            description: "Multiple recent low-scoring exercise submissions",
            recommended_action: "Review fundamental concepts or seek additional help",
        });
    }

    if totals.total > 5 && totals.completed_exercises < 2 {
        out.push(Struggle {
            kind: StruggleKind::SlowProgress,
            severity: Priority::Medium,
            description: "Slow progress in completing exercises",
            recommended_action: "Focus on completing more exercises to build momentum",
        });
    }
    out
}

#[must_use]
pub fn snapshot(user_id: &str, totals: &ActivityTotals, recent: &[Activity]) -> ProgressSnapshot {
    ProgressSnapshot { summary: summarize(user_id, totals, recent), recommendations: recommendations(totals) }
}

#[must_use]
pub fn report(user_id: &str, totals: &ActivityTotals, recent: &[Activity], recent_scores: &[f64]) -> ProgressReport {
    let recommendations = recommendations(totals);
    let action_items = recommendations
        .iter()
        .filter(|r| matches!(r.priority, Priority::High | Priority::Medium))
        .cloned()
        .collect();
    ProgressReport {
        user_id: user_id.to_string(),
        generated_at: OffsetDateTime::now_utc(),
        summary: summarize(user_id, totals, recent),
        recommendations,
        struggles: detect_struggles(totals, recent_scores),
        action_items,
    }
}

// =============================================================================
// AGENT
// =============================================================================

#[must_use]
pub fn respond(snapshot: Option<&ProgressSnapshot>) -> AgentReply {
    match snapshot {
        Some(snapshot) => AgentReply::new(
            AgentKind::Progress,
            format!("Progress report for student {}", snapshot.summary.user_id),
            0.9,
            ReplyPayload::Progress(snapshot.clone()),
        ),
        None => AgentReply::prompt(AgentKind::Progress, "Student ID required to retrieve progress information"),
    }
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
