//! OIDC authorization-code exchange and id_token validation.

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tracing::info;

use coursehub_core::config::AuthConfig;
use coursehub_core::error::{AppError, ErrorKind};
use coursehub_core::result::AppResult;

/// Claims extracted from a validated id_token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    /// Subject identifier.
    pub sub: String,
    /// Email address, when the provider supplies one.
    pub email: Option<String>,
    /// Display name, when the provider supplies one.
    pub name: Option<String>,
    /// Expiry, validated by jsonwebtoken.
    pub exp: i64,
}

impl IdTokenClaims {
    /// The identifier stored as `userid`: the email when present,
    /// otherwise the subject.
    pub fn preferred_userid(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.sub)
    }
}

/// Shape of the token endpoint's response; only the id_token is used.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

/// Exchanges authorization codes and validates id_tokens.
pub struct OidcClient {
    http: reqwest::Client,
    config: AuthConfig,
    redirect_uri: String,
    jwks: JwkSet,
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("client_id", &self.config.client_id)
            .finish()
    }
}

impl OidcClient {
    /// Fetch the provider's signing keys and build a client.
    pub async fn discover(config: AuthConfig, redirect_uri: String) -> AppResult<Self> {
        let http = reqwest::Client::new();
        let jwks: JwkSet = http
            .get(&config.jwks_url)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Failed to fetch JWKS: {e}"),
                    e,
                )
            })?
            .json()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Failed to parse JWKS: {e}"),
                    e,
                )
            })?;

        info!(keys = jwks.keys.len(), "OIDC signing keys loaded");
        Ok(Self::with_jwks(config, redirect_uri, jwks))
    }

    /// Build a client around an already-fetched key set.
    pub fn with_jwks(config: AuthConfig, redirect_uri: String, jwks: JwkSet) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            redirect_uri,
            jwks,
        }
    }

    /// Exchange an authorization code for a validated identity.
    pub async fn exchange_code(&self, code: &str) -> AppResult<IdTokenClaims> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Token exchange failed: {e}"),
                    e,
                )
            })?;

        if !response.status().is_success() {
            return Err(AppError::unauthorized(format!(
                "Token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Malformed token response: {e}"),
                e,
            )
        })?;

        self.verify_id_token(&token.id_token)
    }

    /// Validate an id_token's signature, expiry, and audience.
    pub fn verify_id_token(&self, token: &str) -> AppResult<IdTokenClaims> {
        let header = decode_header(token).map_err(|e| {
            AppError::with_source(ErrorKind::Unauthorized, "Malformed id_token header", e)
        })?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::unauthorized("id_token has no key id"))?;
        let jwk = self
            .jwks
            .find(&kid)
            .ok_or_else(|| AppError::unauthorized("id_token signed by an unknown key"))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| {
            AppError::with_source(ErrorKind::Unauthorized, "Unusable signing key", e)
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.config.client_id]);
        validation.leeway = 5;

        decode::<IdTokenClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Unauthorized,
                    format!("id_token validation failed: {e}"),
                    e,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_userid() {
        let mut claims = IdTokenClaims {
            sub: "oid-123".to_string(),
            email: Some("student@example.org".to_string()),
            name: None,
            exp: 0,
        };
        assert_eq!(claims.preferred_userid(), "student@example.org");
        claims.email = None;
        assert_eq!(claims.preferred_userid(), "oid-123");
    }
}
