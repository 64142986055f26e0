//! Account routes.
//!
//! Signing up is open, but only as a student. Teacher and admin accounts
//! need an admin session, except for the very first account, which
//! bootstraps an empty deployment.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AuthUser, STAFF_ROLES};
use crate::error::ApiError;
use crate::models::{NewUser, User, UserRole};
use crate::services::users;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    users::MAX_PAGE_SIZE
}

/// `POST /api/v1/users`: create an account.
pub async fn create_user(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    let elevated = body.role.is_some_and(|role| role != UserRole::Student);
    if elevated {
        let is_admin = auth.as_ref().is_some_and(|a| a.user.role == UserRole::Admin);
        let first_account = state.store.list_users(0, 1).await?.is_empty();
        if !is_admin && !first_account {
            return Err(ApiError::forbidden("only admins can create teacher or admin accounts"));
        }
    }

    let user = users::create(state.store.as_ref(), body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/v1/users`: page through accounts (staff only).
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    auth.require_role(STAFF_ROLES)?;
    Ok(Json(users::list(state.store.as_ref(), query.skip, query.limit).await?))
}

/// `GET /api/v1/users/:id`: one account; learners may only read their own.
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    if auth.user.id != id && !auth.is_staff() {
        return Err(ApiError::forbidden("cannot read another user's account"));
    }
    Ok(Json(users::get(state.store.as_ref(), id).await?))
}
