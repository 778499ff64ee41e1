//! The selection engine: admission control, transactional commit, and
//! compensation.
//!
//! A hold is granted in two coupled steps. The choice row is inserted
//! inside an open transaction, then the in-memory seat counter decides
//! admission under the per-course lock. Only an admitted request
//! commits; a declined one rolls back, and a failed commit is
//! compensated by giving the seat back and re-propagating the count.
//! The database's unique constraint handles duplicate holds; capacity
//! lives in memory so a full course rejects instantly without a
//! round-trip and without a hot row.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;

use coursehub_core::error::{AppError, ErrorKind};
use coursehub_core::result::AppResult;
use coursehub_database::repositories::ChoiceRepository;
use coursehub_database::repositories::choice::is_unique_violation;
use coursehub_entity::choice::UserSelection;
use coursehub_entity::mode::Mode;

use crate::catalogue::Catalogue;
use crate::mode::ModeController;
use crate::notifier::UpdateNotifier;
use crate::protocol::{RejectReason, ServerFrame};

/// Reply sent when a `Y`/`N` arrives while selections are not open.
const NOT_OPEN: &str = "Course selections are not open";

/// Per-session bookkeeping rebuilt from the user's durable choices at
/// attach time and maintained by the handlers.
///
/// Mutated without locking: message handlers for one session never run
/// concurrently.
#[derive(Debug, Default)]
pub struct SessionSelections {
    /// Groups in which the user currently holds a course.
    pub groups: HashSet<String>,
    /// How many held courses carry each classification tag. Exposed
    /// but not capped.
    pub type_counts: HashMap<String, u32>,
}

impl SessionSelections {
    /// Rebuild the bookkeeping from the user's joined choice rows.
    pub fn from_rows(rows: &[UserSelection]) -> Self {
        let mut selections = Self::default();
        for row in rows {
            selections.groups.insert(row.group.clone());
            *selections.type_counts.entry(row.kind.clone()).or_insert(0) += 1;
        }
        selections
    }
}

/// Executes `choose`/`unchoose` requests against the catalogue and the
/// database.
#[derive(Debug)]
pub struct SelectionEngine {
    pool: PgPool,
    choices: ChoiceRepository,
    catalogue: Arc<Catalogue>,
    notifier: Arc<UpdateNotifier>,
    mode: Arc<ModeController>,
    propagate_immediate: bool,
}

impl SelectionEngine {
    /// Create a selection engine.
    pub fn new(
        pool: PgPool,
        catalogue: Arc<Catalogue>,
        notifier: Arc<UpdateNotifier>,
        mode: Arc<ModeController>,
        propagate_immediate: bool,
    ) -> Self {
        let choices = ChoiceRepository::new(pool.clone());
        Self {
            pool,
            choices,
            catalogue,
            notifier,
            mode,
            propagate_immediate,
        }
    }

    /// The choice repository, for populate-time reads.
    pub fn choices(&self) -> &ChoiceRepository {
        &self.choices
    }

    /// Handle `Y <courseid>`.
    ///
    /// Returns the frames to deliver, in order. An `Err` is terminal
    /// for the session.
    pub async fn choose(
        &self,
        userid: &str,
        course_id: i32,
        selections: &mut SessionSelections,
    ) -> AppResult<Vec<ServerFrame>> {
        if self.mode.current() != Mode::Open {
            return Ok(vec![ServerFrame::error(NOT_OPEN)]);
        }

        let Some(course) = self.catalogue.lookup(course_id) else {
            return Ok(vec![ServerFrame::Reject {
                course_id,
                reason: RejectReason::NoSuchCourse,
            }]);
        };

        if selections.groups.contains(&course.group) {
            return Ok(vec![ServerFrame::Reject {
                course_id,
                reason: RejectReason::GroupConflict,
            }]);
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let seltime = Utc::now().timestamp_micros();
        if let Err(e) = self
            .choices
            .insert_in_tx(&mut tx, userid, course_id, seltime)
            .await
        {
            if is_unique_violation(&e) {
                // The user already holds this seat; re-confirm without
                // touching the counter.
                debug!(userid = %userid, course_id, "duplicate hold re-confirmed");
                return Ok(vec![ServerFrame::Confirm { course_id }]);
            }
            return Err(AppError::with_source(
                ErrorKind::Database,
                "Failed to insert course choice",
                e,
            ));
        }

        if course.try_admit() {
            if let Err(e) = tx.commit().await {
                // The in-memory count is now ahead of the database;
                // give the seat back and tell subscribers.
                self.notifier.release_and_propagate(&course);
                return Err(AppError::with_source(
                    ErrorKind::Database,
                    "Failed to commit course choice",
                    e,
                ));
            }

            selections.groups.insert(course.group.clone());
            *selections
                .type_counts
                .entry(course.kind.clone())
                .or_insert(0) += 1;

            self.notifier.propagate(&course);
            debug!(userid = %userid, course_id, selected = course.selected(), "seat granted");

            let mut frames = vec![ServerFrame::Confirm { course_id }];
            if self.propagate_immediate {
                frames.push(ServerFrame::Count {
                    course_id,
                    selected: course.selected(),
                });
            }
            Ok(frames)
        } else {
            tx.rollback().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to roll back full course", e)
            })?;
            Ok(vec![ServerFrame::Reject {
                course_id,
                reason: RejectReason::Full,
            }])
        }
    }

    /// Handle `N <courseid>`.
    ///
    /// Releasing a course the user does not hold — or one that does
    /// not exist at all — is an idempotent no-op: the delete removes
    /// nothing and the reply is still `N <courseid>`. An `Err` is
    /// terminal for the session.
    pub async fn unchoose(
        &self,
        userid: &str,
        course_id: i32,
        selections: &mut SessionSelections,
    ) -> AppResult<Vec<ServerFrame>> {
        if self.mode.current() != Mode::Open {
            return Ok(vec![ServerFrame::error(NOT_OPEN)]);
        }

        let removed = self.choices.delete(userid, course_id).await?;
        if removed > 0 {
            let Some(course) = self.catalogue.lookup(course_id) else {
                // A durable row was removed for a course the catalogue
                // has never heard of; the seat counters can no longer
                // be trusted.
                return Err(AppError::session(
                    "released a course missing from the catalogue",
                ));
            };

            self.notifier.release_and_propagate(&course);

            if !selections.groups.remove(&course.group) {
                // The durable row existed but the session never tracked
                // its group: the bookkeeping has diverged and every
                // further answer from this session would be suspect.
                return Err(AppError::session(
                    "session bookkeeping does not match released course",
                ));
            }
            if let Some(count) = selections.type_counts.get_mut(&course.kind) {
                *count = count.saturating_sub(1);
            }
            debug!(userid = %userid, course_id, selected = course.selected(), "seat released");
        } else {
            debug!(userid = %userid, course_id, "release for a course not held");
        }

        Ok(vec![ServerFrame::Released { course_id }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selections_from_rows() {
        let rows = vec![
            UserSelection {
                courseid: 1,
                group: "sports".to_string(),
                kind: "enrichment".to_string(),
            },
            UserSelection {
                courseid: 2,
                group: "arts".to_string(),
                kind: "enrichment".to_string(),
            },
        ];
        let selections = SessionSelections::from_rows(&rows);
        assert!(selections.groups.contains("sports"));
        assert!(selections.groups.contains("arts"));
        assert_eq!(selections.type_counts.get("enrichment"), Some(&2));
    }
}
