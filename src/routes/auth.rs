//! Auth routes: password login, session management, role checks.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::error::{ApiError, require};
use crate::models::{User, UserRole};
use crate::services::{session, users};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

/// Roles allowed to see other learners' data.
pub(crate) const STAFF_ROLES: &[UserRole] = &[UserRole::Teacher, UserRole::Admin];

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user resolved from `Authorization: Bearer <token>` or the
/// session cookie. Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    /// Reject unless the user holds one of `roles`.
    ///
    /// # Errors
    ///
    /// Returns `E_FORBIDDEN` for any other role.
    pub fn require_role(&self, roles: &[UserRole]) -> Result<(), ApiError> {
        if roles.contains(&self.user.role) {
            return Ok(());
        }
        Err(ApiError::forbidden(format!("{} role cannot access this resource", self.user.role)))
    }

    #[must_use]
    pub fn is_staff(&self) -> bool {
        STAFF_ROLES.contains(&self.user.role)
    }
}

fn bearer_token(parts: &axum::http::request::Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = bearer_token(parts)
            .or_else(|| jar.get(COOKIE_NAME).map(Cookie::value))
            .unwrap_or_default()
            .to_owned();
        if token.is_empty() {
            return Err(ApiError::unauthorized());
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(app_state.store.as_ref(), &token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { user, token })
    }
}

/// `Option<AuthUser>`: anonymous requests yield `None`; a store failure
/// still rejects.
impl<S> axum::extract::OptionalFromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <Self as axum::extract::FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(auth) => Ok(Some(auth)),
            Err(e) if e.status == StatusCode::UNAUTHORIZED => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// `POST /api/v1/auth/login`: verify credentials, issue a session token
/// (returned in the body and set as an `HttpOnly` cookie).
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Result<impl IntoResponse, ApiError> {
    let email = require("email", body.email.as_deref())?;
    let password = body.password.as_deref().unwrap_or_default();
    if password.is_empty() {
        return Err(ApiError::missing_field("password"));
    }

    let user = users::authenticate(state.store.as_ref(), email, password).await?;
    let token = session::create_session(state.store.as_ref(), user.id, state.config.session_ttl_hours).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");

    let mut cookie = session_cookie(token.clone(), state.config.cookie_secure);
    cookie.set_max_age(Duration::hours(state.config.session_ttl_hours));
    let jar = CookieJar::new().add(cookie);
    Ok((jar, Json(LoginResponse { token, user })))
}

/// `GET /api/v1/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

/// `POST /api/v1/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(state.store.as_ref(), &auth.token).await {
        tracing::warn!(error = %e, user_id = %auth.user.id, "session delete failed");
    }

    let mut cookie = session_cookie(String::new(), state.config.cookie_secure);
    cookie.set_max_age(Duration::ZERO);
    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
