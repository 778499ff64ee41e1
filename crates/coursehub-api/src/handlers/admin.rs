//! Admin endpoints: read and switch the global mode.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use coursehub_core::error::AppError;
use coursehub_core::result::AppResult;
use coursehub_entity::mode::Mode;

use crate::cookies::session_cookie;
use crate::state::AppState;

/// Response body for the current mode.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    /// The mode as its persisted integer.
    pub state: u32,
}

/// Request body for a mode switch.
#[derive(Debug, Deserialize)]
pub struct StateRequest {
    /// The target mode as its persisted integer.
    pub state: u32,
}

/// GET /admin/state — the current mode.
pub async fn get_state(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StateResponse>, AppError> {
    require_admin(&state, &headers).await?;
    Ok(Json(StateResponse {
        state: state.engine.mode.current() as u32,
    }))
}

/// POST /admin/state — switch the mode.
pub async fn set_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StateRequest>,
) -> Result<StatusCode, AppError> {
    let admin = require_admin(&state, &headers).await?;
    let mode = Mode::try_from(request.state)
        .map_err(|_| AppError::bad_request("state must be 0 (closed), 1 (frozen), or 2 (open)"))?;

    state.engine.mode.set_mode(mode).await?;
    info!(admin = %admin, ?mode, "mode switched");
    Ok(StatusCode::NO_CONTENT)
}

/// Resolve the caller's session and require admin membership.
async fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<String> {
    let cookie = session_cookie(headers)
        .ok_or_else(|| AppError::unauthorized("missing session cookie"))?;
    let session = state
        .sessions
        .find_by_cookie(&cookie)
        .await?
        .filter(|s| !s.is_expired(Utc::now().timestamp()))
        .ok_or_else(|| AppError::unauthorized("unknown or expired session"))?;

    if !state.config.auth.admin_users.contains(&session.userid) {
        return Err(AppError::forbidden("not an administrator"));
    }
    Ok(session.userid)
}
