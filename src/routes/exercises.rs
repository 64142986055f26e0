//! Practice exercise catalog. Reference solutions never leave the server.

use axum::extract::{Path, Query};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::Difficulty;
use crate::services::agents::exercise::{self, EXERCISES, Exercise, ExerciseError};

#[derive(Deserialize)]
pub struct ExerciseQuery {
    difficulty: Option<Difficulty>,
    category: Option<String>,
}

#[derive(Serialize)]
pub struct ExerciseCatalog {
    pub exercises: Vec<&'static Exercise>,
    pub categories: Vec<&'static str>,
}

/// `GET /api/v1/exercises?difficulty=&category=`
pub async fn list_exercises(Query(query): Query<ExerciseQuery>) -> Json<ExerciseCatalog> {
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let exercises = EXERCISES
        .iter()
        .filter(|e| query.difficulty.is_none_or(|d| e.difficulty == d))
        .filter(|e| category.is_none_or(|c| e.category.eq_ignore_ascii_case(c)))
        .collect();
    Json(ExerciseCatalog { exercises, categories: exercise::categories() })
}

/// `GET /api/v1/exercises/:id`
pub async fn get_exercise(Path(id): Path<String>) -> Result<Json<&'static Exercise>, ApiError> {
    exercise::find(&id)
        .map(Json)
        .ok_or_else(|| ExerciseError::NotFound(id).into())
}
