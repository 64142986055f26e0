//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the versioned JSON API under `/api/v1` plus the three
//! front-end endpoints under `/api` (`/api/code`, `/api/tutor`,
//! `/api/progress`), which keep the camelCase shapes the editor and chat
//! panel already speak. Every route shares one `AppState`.

pub mod alerts;
pub mod auth;
pub mod code;
pub mod compat;
pub mod exercises;
pub mod lessons;
pub mod progress;
pub mod tutor;
pub mod users;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        // --- accounts -------------------------------------------------------
        .route("/api/v1/users", post(users::create_user).get(users::list_users))
        .route("/api/v1/users/{id}", get(users::get_user))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/logout", post(auth::logout))
        // --- curriculum -----------------------------------------------------
        .route("/api/v1/lessons", get(lessons::list_lessons).post(lessons::create_lesson))
        .route("/api/v1/lessons/by-slug/{slug}", get(lessons::get_lesson_by_slug))
        .route("/api/v1/lessons/{id}", get(lessons::get_lesson))
        .route("/api/v1/exercises", get(exercises::list_exercises))
        .route("/api/v1/exercises/{id}", get(exercises::get_exercise))
        // --- progress -------------------------------------------------------
        .route("/api/v1/progress/update", post(progress::update_progress))
        .route("/api/v1/progress/{user_id}", get(progress::get_progress))
        .route("/api/v1/progress/{user_id}/dashboard", get(progress::get_dashboard))
        .route("/api/v1/progress/{user_id}/recommendations", get(progress::get_recommendations))
        .route("/api/v1/progress/{user_id}/report", get(progress::get_report))
        .route("/api/v1/progress/{user_id}/reset", post(progress::reset_progress))
        // --- tutoring -------------------------------------------------------
        .route("/api/v1/tutor", post(tutor::ask))
        .route("/api/v1/tutor/explain-concept", post(tutor::explain_concept))
        .route("/api/v1/tutor/review-code", post(tutor::review_code))
        .route("/api/v1/tutor/debug-code", post(tutor::debug_code))
        .route("/api/v1/code", post(code::execute))
        .route("/api/v1/code/evaluate-exercise", post(code::evaluate_exercise))
        .route("/api/v1/alerts", get(alerts::list_alerts))
        // --- front end ------------------------------------------------------
        .route("/api/code", post(compat::code))
        .route("/api/tutor", post(compat::tutor))
        .route("/api/progress", get(compat::get_progress).post(compat::post_progress))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `GET /`: service banner with an endpoint map.
async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "learnflow",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "users": "/api/v1/users",
            "auth": "/api/v1/auth",
            "lessons": "/api/v1/lessons",
            "exercises": "/api/v1/exercises",
            "progress": "/api/v1/progress",
            "tutor": "/api/v1/tutor",
            "code": "/api/v1/code",
            "alerts": "/api/v1/alerts",
        },
    }))
}

/// `GET /health`: store reachability and event worker liveness.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = state.store.health_check().await;
    let events_ok = state.events.is_running();
    let healthy = store_ok && events_ok;
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let body = json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "checks": {
            "store": { "backend": state.store.backend(), "ok": store_ok },
            "event_bus": { "ok": events_ok },
            "llm": { "configured": state.llm.is_some() },
        },
    });
    (status, Json(body))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
