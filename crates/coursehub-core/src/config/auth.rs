//! OAuth2/OIDC authentication configuration.

use serde::{Deserialize, Serialize};

/// OAuth2/OIDC configuration.
///
/// The login flow is authorization-code: the index page links to
/// `authorize_url`, the provider redirects back to `/auth`, and the
/// callback exchanges the code at `token_url` and validates the id_token
/// against the key set at `jwks_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    #[serde(default)]
    pub client_secret: String,
    /// Authorization endpoint URL.
    pub authorize_url: String,
    /// Token endpoint URL.
    pub token_url: String,
    /// JWKS endpoint URL for id_token signature validation.
    pub jwks_url: String,
    /// Session cookie lifetime in seconds.
    #[serde(default = "default_cookie_expiry")]
    pub cookie_expiry_seconds: u64,
    /// User ids allowed to call the admin endpoints.
    #[serde(default)]
    pub admin_users: Vec<String>,
}

fn default_cookie_expiry() -> u64 {
    604_800
}
