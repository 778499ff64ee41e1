//! Authenticated browser session repository.

use sqlx::PgPool;

use coursehub_core::error::{AppError, ErrorKind};
use coursehub_core::result::AppResult;
use coursehub_entity::session::AuthSession;

/// Repository for the `sessions` table (cookie → user bindings issued
/// by the OAuth2 callback).
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a session by its cookie value.
    pub async fn find_by_cookie(&self, cookie: &str) -> AppResult<Option<AuthSession>> {
        sqlx::query_as::<_, AuthSession>(
            "SELECT cookie, userid, expr FROM sessions WHERE cookie = $1",
        )
        .bind(cookie)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    /// Create a session binding for a freshly authenticated user.
    pub async fn create(&self, cookie: &str, userid: &str, expr: i64) -> AppResult<()> {
        sqlx::query("INSERT INTO sessions (cookie, userid, expr) VALUES ($1, $2, $3)")
            .bind(cookie)
            .bind(userid)
            .bind(expr)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create session", e))?;
        Ok(())
    }

    /// Remove expired session rows; returns the number deleted.
    pub async fn delete_expired(&self, now: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expr <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete expired sessions", e)
            })?;
        Ok(result.rows_affected())
    }
}
