//! Code execution and exercise grading routes.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use crate::error::{ApiError, require};
use crate::services::agents::exercise::Evaluation;
use crate::services::executor::{ExecutionOutcome, ExecutionRequest};
use crate::services::tutor;
use crate::state::AppState;

/// Learner id recorded when a caller runs code without identifying itself.
pub(crate) const ANONYMOUS_USER: &str = "anonymous";

#[derive(Deserialize)]
pub struct ExecuteBody {
    user_id: Option<String>,
    #[serde(flatten)]
    request: ExecutionRequest,
}

#[derive(Deserialize)]
pub struct EvaluateBody {
    user_id: Option<String>,
    exercise_id: Option<String>,
    solution: Option<String>,
}

/// `POST /api/v1/code`: run a Python snippet.
pub async fn execute(State(state): State<AppState>, Json(body): Json<ExecuteBody>) -> Result<Json<ExecutionOutcome>, ApiError> {
    require("code", Some(body.request.code.as_str()))?;
    let user_id = body.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty()).unwrap_or(ANONYMOUS_USER);
    Ok(Json(tutor::run_code(&state, user_id, &body.request).await?))
}

/// `POST /api/v1/code/evaluate-exercise`: grade a solution.
pub async fn evaluate_exercise(
    State(state): State<AppState>,
    Json(body): Json<EvaluateBody>,
) -> Result<Json<Evaluation>, ApiError> {
    let user_id = require("user_id", body.user_id.as_deref())?;
    let exercise_id = require("exercise_id", body.exercise_id.as_deref())?;
    let solution = require("solution", body.solution.as_deref())?;
    Ok(Json(tutor::evaluate_exercise(&state, user_id, exercise_id, solution).await?))
}
