//! Lesson catalog routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use uuid::Uuid;

use super::auth::{AuthUser, STAFF_ROLES};
use crate::error::ApiError;
use crate::models::{Lesson, NewLesson};
use crate::services::lessons;
use crate::state::AppState;

/// `GET /api/v1/lessons`: full catalog, oldest first.
pub async fn list_lessons(State(state): State<AppState>) -> Result<Json<Vec<Lesson>>, ApiError> {
    Ok(Json(lessons::list(state.store.as_ref()).await?))
}

/// `POST /api/v1/lessons`: add a lesson (teacher or admin).
pub async fn create_lesson(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewLesson>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(STAFF_ROLES)?;
    let lesson = lessons::create(state.store.as_ref(), body).await?;
    tracing::info!(lesson_id = %lesson.id, slug = %lesson.slug, author = %auth.user.id, "lesson created");
    Ok((StatusCode::CREATED, Json(lesson)))
}

/// `GET /api/v1/lessons/:id`
pub async fn get_lesson(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Lesson>, ApiError> {
    Ok(Json(lessons::get(state.store.as_ref(), id).await?))
}

/// `GET /api/v1/lessons/by-slug/:slug`
pub async fn get_lesson_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Lesson>, ApiError> {
    Ok(Json(lessons::get_by_slug(state.store.as_ref(), &slug).await?))
}
