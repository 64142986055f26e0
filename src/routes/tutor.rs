//! Tutoring routes: free-form questions plus direct agent operations.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use crate::error::{ApiError, require};
use crate::services::agents::code_review::ReviewReport;
use crate::services::agents::concepts::ConceptView;
use crate::services::agents::debug::DebugReport;
use crate::services::tutor::{self, TutorContext, TutorReply};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AskBody {
    user_id: Option<String>,
    message: Option<String>,
    #[serde(default)]
    context: TutorContext,
}

#[derive(Deserialize)]
pub struct ConceptBody {
    concept: Option<String>,
}

#[derive(Deserialize)]
pub struct CodeBody {
    user_id: Option<String>,
    code: Option<String>,
    error_message: Option<String>,
}

/// `POST /api/v1/tutor`: route a question to an agent.
pub async fn ask(State(state): State<AppState>, Json(body): Json<AskBody>) -> Result<Json<TutorReply>, ApiError> {
    let user_id = require("user_id", body.user_id.as_deref())?;
    let message = require("message", body.message.as_deref())?;
    Ok(Json(tutor::process(&state, user_id, message, &body.context).await))
}

/// `POST /api/v1/tutor/explain-concept`
pub async fn explain_concept(Json(body): Json<ConceptBody>) -> Result<Json<ConceptView>, ApiError> {
    let concept = require("concept", body.concept.as_deref())?;
    Ok(Json(tutor::explain_concept(concept)?))
}

/// `POST /api/v1/tutor/review-code`
pub async fn review_code(State(state): State<AppState>, Json(body): Json<CodeBody>) -> Result<Json<ReviewReport>, ApiError> {
    let user_id = require("user_id", body.user_id.as_deref())?;
    let code = require("code", body.code.as_deref())?;
    Ok(Json(tutor::review_code(&state, user_id, code).await))
}

/// `POST /api/v1/tutor/debug-code`
pub async fn debug_code(State(state): State<AppState>, Json(body): Json<CodeBody>) -> Result<Json<DebugReport>, ApiError> {
    let user_id = require("user_id", body.user_id.as_deref())?;
    let code = require("code", body.code.as_deref())?;
    Ok(Json(tutor::debug_code(&state, user_id, code, body.error_message.as_deref()).await))
}
