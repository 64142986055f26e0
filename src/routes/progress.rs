//! Learner progress routes. Learner ids are free-form strings, matching the
//! ids the tutoring front end already sends.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, require};
use crate::models::{ProgressPatch, ProgressRecord};
use crate::services::agents::progress::{ProgressReport, Recommendation};
use crate::services::progress::{self, Dashboard, UserProgress};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateBody {
    user_id: Option<String>,
    lesson_id: Option<String>,
    #[serde(flatten)]
    patch: ProgressPatch,
}

#[derive(Serialize)]
pub struct RecommendationsResponse {
    pub user_id: String,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub user_id: String,
    pub removed_activities: u64,
}

/// `GET /api/v1/progress/:user_id`
pub async fn get_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProgress>, ApiError> {
    Ok(Json(progress::get_user_progress(&state, &user_id).await?))
}

/// `GET /api/v1/progress/:user_id/dashboard`
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(progress::dashboard(&state, &user_id).await?))
}

/// `POST /api/v1/progress/update`: partial update of one lesson record.
pub async fn update_progress(
    State(state): State<AppState>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<ProgressRecord>, ApiError> {
    let user_id = require("user_id", body.user_id.as_deref())?;
    let lesson_id = require("lesson_id", body.lesson_id.as_deref())?;
    if body.patch.score.is_some_and(|s| !(0.0..=100.0).contains(&s)) {
        return Err(ApiError::invalid_field("score", "must be between 0 and 100"));
    }
    Ok(Json(progress::update_progress(&state, user_id, lesson_id, &body.patch).await?))
}

/// `GET /api/v1/progress/:user_id/recommendations`
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let recommendations = progress::recommendations(&state, &user_id).await?;
    Ok(Json(RecommendationsResponse { user_id, recommendations }))
}

/// `GET /api/v1/progress/:user_id/report`
pub async fn get_report(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProgressReport>, ApiError> {
    Ok(Json(progress::report(&state, &user_id).await?))
}

/// `POST /api/v1/progress/:user_id/reset`: clear the activity history.
pub async fn reset_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let removed_activities = progress::reset(&state, &user_id).await?;
    Ok(Json(ResetResponse { user_id, removed_activities }))
}
