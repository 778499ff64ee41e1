//! Index page handler.

use std::path::Path;

use axum::extract::State;
use axum::response::Html;

use coursehub_core::error::AppError;

use crate::state::AppState;

/// GET / — the index page, served from the static directory.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let path = Path::new(&state.config.server.static_dir).join("index.html");
    let body = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AppError::internal(format!("Cannot read index page: {e}")))?;
    Ok(Html(body))
}
