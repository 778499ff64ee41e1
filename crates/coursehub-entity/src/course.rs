//! Course catalogue row model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `courses` table.
///
/// The catalogue is immutable at runtime; seat occupancy is tracked
/// separately by the realtime engine.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CourseRow {
    /// Stable course identifier.
    pub id: i32,
    /// Display title.
    pub title: String,
    /// Exclusivity key: a user holds at most one course per group.
    #[sqlx(rename = "group")]
    #[serde(rename = "group")]
    pub group: String,
    /// Soft classification tag, counted per user but not capped.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    /// Seat capacity.
    pub max: i32,
}
