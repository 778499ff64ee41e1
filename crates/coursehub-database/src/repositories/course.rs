//! Course catalogue repository.

use sqlx::PgPool;

use coursehub_core::error::{AppError, ErrorKind};
use coursehub_core::result::AppResult;
use coursehub_entity::course::CourseRow;

/// Repository for the immutable `courses` table.
#[derive(Debug, Clone)]
pub struct CourseRepository {
    pool: PgPool,
}

impl CourseRepository {
    /// Create a new course repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the full catalogue, ordered by id.
    pub async fn find_all(&self) -> AppResult<Vec<CourseRow>> {
        sqlx::query_as::<_, CourseRow>(
            r#"SELECT id, title, "group", "type", "max" FROM courses ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load courses", e))
    }
}
