//! OAuth2/OIDC callback handler.

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use coursehub_core::error::AppError;

use crate::cookies::SESSION_COOKIE;
use crate::state::AppState;

/// Query parameters delivered by the provider's redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange.
    pub code: String,
    /// Opaque state round-tripped through the provider.
    pub state: Option<String>,
}

/// GET /auth — completes the login: exchanges the code, validates the
/// id_token, stores a session row, and sets the session cookie.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let claims = state.oidc.exchange_code(&query.code).await?;
    let userid = claims.preferred_userid().to_string();

    let cookie = Uuid::new_v4().to_string();
    let expiry = state.config.auth.cookie_expiry_seconds;
    let expr = Utc::now().timestamp() + expiry as i64;
    state.sessions.create(&cookie, &userid, expr).await?;

    info!(userid = %userid, "login completed");

    let mut cookie_attrs = format!(
        "{SESSION_COOKIE}={cookie}; Path=/; HttpOnly; SameSite=Lax; Max-Age={expiry}"
    );
    if state.config.server.prod {
        cookie_attrs.push_str("; Secure");
    }

    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(header::LOCATION, "/")
        .header(header::SET_COOKIE, cookie_attrs)
        .body(axum::body::Body::empty())
        .map_err(|e| AppError::internal(format!("Cannot build redirect: {e}")))
}
