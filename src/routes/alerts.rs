//! Teacher alerts raised by struggle detection.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use super::auth::{AuthUser, STAFF_ROLES};
use crate::error::ApiError;
use crate::models::Alert;
use crate::state::AppState;

const DEFAULT_ALERT_LIMIT: usize = 50;
const MAX_ALERT_LIMIT: usize = 200;

#[derive(Deserialize)]
pub struct AlertQuery {
    limit: Option<usize>,
}

/// `GET /api/v1/alerts?limit=`: newest first (teacher or admin).
pub async fn list_alerts(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    auth.require_role(STAFF_ROLES)?;
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT).clamp(1, MAX_ALERT_LIMIT);
    Ok(Json(state.store.list_alerts(limit).await?))
}
