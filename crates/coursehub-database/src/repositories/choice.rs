//! Choice (seat hold) repository.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};

use coursehub_core::error::{AppError, ErrorKind};
use coursehub_core::result::AppResult;
use coursehub_entity::choice::UserSelection;

/// PostgreSQL SQLSTATE for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Repository for the `choices` table.
#[derive(Debug, Clone)]
pub struct ChoiceRepository {
    pool: PgPool,
}

impl ChoiceRepository {
    /// Create a new choice repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count existing choices per course, for the startup seat rebuild.
    pub async fn count_by_course(&self) -> AppResult<HashMap<i32, i64>> {
        let rows: Vec<(i32, i64)> =
            sqlx::query_as("SELECT courseid, COUNT(*) FROM choices GROUP BY courseid")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to count choices", e)
                })?;
        Ok(rows.into_iter().collect())
    }

    /// List the ids of the courses a user currently holds.
    pub async fn find_course_ids_by_user(&self, userid: &str) -> AppResult<Vec<i32>> {
        sqlx::query_scalar("SELECT courseid FROM choices WHERE userid = $1 ORDER BY courseid")
            .bind(userid)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fetch choices", e))
    }

    /// Load a user's choices joined with the catalogue attributes needed
    /// to rebuild per-session group and type bookkeeping.
    pub async fn find_selections_by_user(&self, userid: &str) -> AppResult<Vec<UserSelection>> {
        sqlx::query_as::<_, UserSelection>(
            r#"SELECT c.courseid, o."group", o."type"
               FROM choices c JOIN courses o ON o.id = c.courseid
               WHERE c.userid = $1 ORDER BY c.courseid"#,
        )
        .bind(userid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fetch selections", e))
    }

    /// Insert a choice inside an open transaction.
    ///
    /// Returns the raw sqlx error so the caller can distinguish a
    /// unique violation (the user already holds this seat) from a
    /// transient failure; see [`is_unique_violation`].
    pub async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: &str,
        courseid: i32,
        seltime: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO choices (seltime, userid, courseid) VALUES ($1, $2, $3)")
            .bind(seltime)
            .bind(userid)
            .bind(courseid)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Delete a user's choice; returns the number of rows removed.
    pub async fn delete(&self, userid: &str, courseid: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM choices WHERE userid = $1 AND courseid = $2")
            .bind(userid)
            .bind(courseid)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete choice", e))?;
        Ok(result.rows_affected())
    }
}

/// Whether a sqlx error is a PostgreSQL unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}
