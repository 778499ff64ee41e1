//! Global state (mode) persistence.

use sqlx::PgPool;

use coursehub_core::error::{AppError, ErrorKind};
use coursehub_core::result::AppResult;

/// Repository for the `misc` key-value table holding the global mode
/// under the `'state'` key.
#[derive(Debug, Clone)]
pub struct StateRepository {
    pool: PgPool,
}

impl StateRepository {
    /// Create a new state repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read the persisted mode value, inserting the default row (0,
    /// closed) when missing.
    pub async fn load_or_init(&self) -> AppResult<i32> {
        let value: Option<i32> = sqlx::query_scalar("SELECT value FROM misc WHERE key = 'state'")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load state", e))?;

        match value {
            Some(v) => Ok(v),
            None => {
                sqlx::query("INSERT INTO misc (key, value) VALUES ('state', 0)")
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to init state", e)
                    })?;
                Ok(0)
            }
        }
    }

    /// Persist a new mode value.
    pub async fn save(&self, value: i32) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO misc (key, value) VALUES ('state', $1)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save state", e))?;
        Ok(())
    }
}
