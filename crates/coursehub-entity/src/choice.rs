//! Choice (seat hold) row models.

use sqlx::FromRow;

/// A user's choice joined with the catalogue attributes needed to
/// rebuild per-session bookkeeping at attach time.
#[derive(Debug, Clone, FromRow)]
pub struct UserSelection {
    /// Course the seat belongs to.
    pub courseid: i32,
    /// The course's exclusivity group.
    #[sqlx(rename = "group")]
    pub group: String,
    /// The course's classification tag.
    #[sqlx(rename = "type")]
    pub kind: String,
}
