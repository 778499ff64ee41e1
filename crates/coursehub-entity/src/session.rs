//! Authenticated browser session row model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `sessions` table, created by the OAuth2 callback and
/// presented back as the `session` cookie on the WebSocket upgrade.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuthSession {
    /// Opaque cookie value (UUID).
    pub cookie: String,
    /// Authenticated user id.
    pub userid: String,
    /// Expiry as a Unix timestamp in seconds.
    pub expr: i64,
}

impl AuthSession {
    /// Whether the session has expired at the given Unix timestamp.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expr <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let session = AuthSession {
            cookie: "c".to_string(),
            userid: "u".to_string(),
            expr: 100,
        };
        assert!(!session.is_expired(99));
        assert!(session.is_expired(100));
        assert!(session.is_expired(101));
    }
}
