//! Front-end endpoints: `/api/code`, `/api/tutor`, `/api/progress`.
//!
//! DESIGN
//! ======
//! The editor, chat panel, and dashboard post flat camelCase JSON and read
//! flat camelCase replies. These handlers translate those shapes onto the
//! same services the `/api/v1` routes use. Learners are identified by
//! `userId`, defaulting to the demo learner when the client omits it.
//!
//! `/api/code` always answers 200 once the request parses: a blocked or
//! unrunnable program comes back as `status: "error"` with the reason in
//! `errors`, which the editor already renders.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{ApiError, require};
use crate::models::{Activity, ActivityKind, AgentKind, ProgressPatch, ProgressStatus};
use crate::services::executor::ExecutionRequest;
use crate::services::progress::{self, Dashboard};
use crate::services::tutor::{self, TutorContext, TutorError};
use crate::state::AppState;

/// Learner assumed when the front end sends no `userId`.
pub(crate) const DEFAULT_LEARNER: &str = "student-1";

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

fn learner(user_id: Option<&str>) -> &str {
    user_id.map(str::trim).filter(|u| !u.is_empty()).unwrap_or(DEFAULT_LEARNER)
}

// =============================================================================
// CODE
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBody {
    code: Option<String>,
    #[serde(default)]
    input: String,
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeResponse {
    pub output: String,
    pub errors: Option<String>,
    pub status: &'static str,
    /// Milliseconds.
    pub execution_time: u64,
    pub timestamp: String,
}

/// `POST /api/code`
pub async fn code(State(state): State<AppState>, Json(body): Json<CodeBody>) -> Result<Json<CodeResponse>, ApiError> {
    let code = require("code", body.code.as_deref())?;
    let request = ExecutionRequest { code: code.to_string(), input: body.input, language: None };

    let response = match tutor::run_code(&state, learner(body.user_id.as_deref()), &request).await {
        Ok(outcome) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let execution_time = (outcome.execution_time * 1000.0).round().max(0.0) as u64;
            CodeResponse {
                output: outcome.output,
                errors: Some(outcome.errors).filter(|e| !e.is_empty()),
                status: outcome.status.as_str(),
                execution_time,
                timestamp: now_rfc3339(),
            }
        }
        Err(TutorError::Exec(e)) => CodeResponse {
            output: String::new(),
            errors: Some(e.to_string()),
            status: "error",
            execution_time: 0,
            timestamp: now_rfc3339(),
        },
        Err(e) => return Err(e.into()),
    };
    Ok(Json(response))
}

// =============================================================================
// TUTOR
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorBody {
    message: Option<String>,
    #[serde(default)]
    context: Map<String, Value>,
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TutorResponse {
    pub role: &'static str,
    pub content: String,
    pub timestamp: String,
    pub agent: AgentKind,
    pub context: Map<String, Value>,
}

/// Pull routing hints out of the free-form chat context.
fn tutor_context(context: &Map<String, Value>) -> TutorContext {
    TutorContext {
        agent: context.get("agent").and_then(Value::as_str).and_then(|a| a.parse().ok()),
        exercise_id: context.get("exerciseId").and_then(Value::as_str).map(str::to_string),
    }
}

/// `POST /api/tutor`
pub async fn tutor(State(state): State<AppState>, Json(body): Json<TutorBody>) -> Result<Json<TutorResponse>, ApiError> {
    let message = require("message", body.message.as_deref())?;
    let context_user = body.context.get("userId").and_then(Value::as_str);
    let user_id = learner(body.user_id.as_deref().or(context_user)).to_string();

    let reply = tutor::process(&state, &user_id, message, &tutor_context(&body.context)).await;

    let timestamp = now_rfc3339();
    let mut context = body.context;
    context.insert("lastInteraction".into(), Value::String(timestamp.clone()));
    Ok(Json(TutorResponse {
        role: "assistant",
        content: reply.reply.message,
        timestamp,
        agent: reply.reply.agent,
        context,
    }))
}

// =============================================================================
// PROGRESS
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressBody {
    user_id: Option<String>,
    lesson_id: Option<String>,
    exercise_id: Option<String>,
    score: Option<f64>,
    #[serde(default)]
    completed: bool,
}

#[derive(Debug, Serialize)]
pub struct ProgressUpdateResponse {
    pub message: &'static str,
    pub progress: Dashboard,
}

/// `GET /api/progress?userId=`
pub async fn get_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(progress::dashboard(&state, learner(query.user_id.as_deref())).await?))
}

/// `POST /api/progress`: record a completed lesson and/or a scored exercise.
pub async fn post_progress(
    State(state): State<AppState>,
    Json(body): Json<ProgressBody>,
) -> Result<Json<ProgressUpdateResponse>, ApiError> {
    let user_id = learner(body.user_id.as_deref());
    if body.score.is_some_and(|s| !(0.0..=100.0).contains(&s)) {
        return Err(ApiError::invalid_field("score", "must be between 0 and 100"));
    }

    let lesson_id = body.lesson_id.as_deref().map(str::trim).filter(|l| !l.is_empty());
    if let (Some(lesson_id), true) = (lesson_id, body.completed) {
        let patch = ProgressPatch {
            status: Some(ProgressStatus::Completed),
            score: body.score,
            ..ProgressPatch::default()
        };
        progress::update_progress(&state, user_id, lesson_id, &patch).await?;
    }

    let exercise_id = body.exercise_id.as_deref().map(str::trim).filter(|e| !e.is_empty());
    if let (Some(exercise_id), Some(score)) = (exercise_id, body.score) {
        let activity = Activity::new(user_id, ActivityKind::ExerciseEvaluation, exercise_id)
            .with_agent(AgentKind::Exercise)
            .with_outcome(true, Some(score));
        state.store.insert_activity(&activity).await?;
    }

    Ok(Json(ProgressUpdateResponse {
        message: "Progress updated successfully",
        progress: progress::dashboard(&state, user_id).await?,
    }))
}

#[cfg(test)]
#[path = "compat_test.rs"]
mod tests;
