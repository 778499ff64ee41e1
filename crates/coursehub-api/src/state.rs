//! Shared application state threaded through every handler.

use std::sync::Arc;

use coursehub_core::config::AppConfig;
use coursehub_database::repositories::SessionRepository;
use coursehub_realtime::RealtimeEngine;

use crate::oidc::OidcClient;

/// State available to every route via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Authenticated browser sessions.
    pub sessions: SessionRepository,
    /// The realtime selection engine.
    pub engine: Arc<RealtimeEngine>,
    /// OIDC code-exchange client.
    pub oidc: Arc<OidcClient>,
}
