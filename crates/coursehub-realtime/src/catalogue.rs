//! The course catalogue: immutable metadata plus the mutable per-course
//! seat counter and subscriber table.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tracing::{info, warn};

use coursehub_core::result::AppResult;
use coursehub_database::repositories::{ChoiceRepository, CourseRepository};
use coursehub_entity::course::CourseRow;

use crate::signal::UpdateSignal;

/// A course with its live seat counter and subscriber table.
///
/// Metadata never changes after startup. `selected` is read atomically
/// anywhere but written only inside the `selected_lock` critical
/// section, so the check-and-increment that decides an admission can
/// never race.
#[derive(Debug)]
pub struct Course {
    /// Stable course identifier.
    pub id: i32,
    /// Display title.
    pub title: String,
    /// Exclusivity key: a user holds at most one course per group.
    pub group: String,
    /// Soft classification tag, counted per user.
    pub kind: String,
    /// Seat capacity.
    pub max: u32,
    /// Allocated seats; `0 <= selected <= max` outside of crash recovery.
    selected: AtomicU32,
    /// Guards the admission check-and-increment and the release decrement.
    selected_lock: Mutex<()>,
    /// Per-user coalescing signals for seat-count updates.
    subscribers: DashMap<String, UpdateSignal>,
}

impl Course {
    /// Build a course from its catalogue row and the seat count derived
    /// from existing choices.
    pub fn new(row: CourseRow, selected: u32) -> Self {
        let max = row.max.max(0) as u32;
        if selected > max {
            warn!(
                course_id = row.id,
                selected, max, "course is over capacity at startup; further admissions are blocked"
            );
        }
        Self {
            id: row.id,
            title: row.title,
            group: row.group,
            kind: row.kind,
            max,
            selected: AtomicU32::new(selected),
            selected_lock: Mutex::new(()),
            subscribers: DashMap::new(),
        }
    }

    /// Current allocated seat count.
    pub fn selected(&self) -> u32 {
        self.selected.load(Ordering::Acquire)
    }

    /// Try to claim one seat. Returns `false` when the course is full.
    pub fn try_admit(&self) -> bool {
        let _guard = self
            .selected_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if self.selected.load(Ordering::Acquire) < self.max {
            self.selected.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    /// Give one seat back. Returns `false` when the counter was already
    /// zero, which indicates a bookkeeping bug; the counter is left
    /// untouched in that case.
    pub fn release_seat(&self) -> bool {
        let _guard = self
            .selected_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let current = self.selected.load(Ordering::Acquire);
        if current == 0 {
            return false;
        }
        self.selected.store(current - 1, Ordering::Release);
        true
    }

    /// Register a user's coalescing signal for this course.
    pub fn subscribe(&self, userid: &str, signal: UpdateSignal) {
        self.subscribers.insert(userid.to_string(), signal);
    }

    /// Remove a user's signal.
    pub fn unsubscribe(&self, userid: &str) {
        self.subscribers.remove(userid);
    }

    /// Mark every subscriber's signal.
    pub fn signal_subscribers(&self) {
        for entry in self.subscribers.iter() {
            entry.value().set();
        }
    }

    /// Number of subscribed users.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Immutable id → course mapping, built once at startup.
#[derive(Debug)]
pub struct Catalogue {
    courses: HashMap<i32, Arc<Course>>,
}

impl Catalogue {
    /// Load the catalogue and rebuild each seat counter from the
    /// existing choice rows, re-establishing the counter invariant
    /// after a crash.
    pub async fn load(
        courses: &CourseRepository,
        choices: &ChoiceRepository,
    ) -> AppResult<Self> {
        let rows = courses.find_all().await?;
        let counts = choices.count_by_course().await?;

        let courses: HashMap<i32, Arc<Course>> = rows
            .into_iter()
            .map(|row| {
                let selected = counts.get(&row.id).copied().unwrap_or(0).max(0) as u32;
                (row.id, Arc::new(Course::new(row, selected)))
            })
            .collect();

        info!(courses = courses.len(), "course catalogue loaded");
        Ok(Self { courses })
    }

    /// Build a catalogue directly from course values.
    pub fn from_courses(courses: impl IntoIterator<Item = Course>) -> Self {
        Self {
            courses: courses
                .into_iter()
                .map(|c| (c.id, Arc::new(c)))
                .collect(),
        }
    }

    /// Look a course up by id.
    pub fn lookup(&self, id: i32) -> Option<Arc<Course>> {
        self.courses.get(&id).cloned()
    }

    /// Visit every course.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Course>)) {
        for course in self.courses.values() {
            f(course);
        }
    }

    /// Number of courses.
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: i32, max: i32) -> Course {
        Course::new(
            CourseRow {
                id,
                title: format!("Course {id}"),
                group: "g".to_string(),
                kind: "t".to_string(),
                max,
            },
            0,
        )
    }

    #[test]
    fn test_admit_until_full() {
        let c = course(1, 3);
        assert!(c.try_admit());
        assert!(c.try_admit());
        assert!(c.try_admit());
        assert!(!c.try_admit());
        assert_eq!(c.selected(), 3);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_capacity() {
        let c = Arc::new(course(7, 10));
        let admitted = std::thread::scope(|s| {
            let handles: Vec<_> = (0..64)
                .map(|_| {
                    let c = Arc::clone(&c);
                    s.spawn(move || c.try_admit())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join())
                .filter(|r| matches!(r, Ok(true)))
                .count()
        });
        assert_eq!(admitted, 10);
        assert_eq!(c.selected(), 10);
    }

    #[test]
    fn test_release_clamps_at_zero() {
        let c = course(2, 5);
        assert!(c.try_admit());
        assert!(c.release_seat());
        assert!(!c.release_seat());
        assert_eq!(c.selected(), 0);
    }

    #[test]
    fn test_over_capacity_startup_blocks_admission() {
        let row = CourseRow {
            id: 9,
            title: "over".to_string(),
            group: "g".to_string(),
            kind: "t".to_string(),
            max: 2,
        };
        let c = Course::new(row, 3);
        assert!(!c.try_admit());
        assert_eq!(c.selected(), 3);
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let c = course(3, 1);
        let (signal, mut waiter) = crate::signal::update_signal();
        c.subscribe("alice", signal);
        assert_eq!(c.subscriber_count(), 1);
        c.signal_subscribers();
        assert!(waiter.try_wait());
        c.unsubscribe("alice");
        assert_eq!(c.subscriber_count(), 0);
    }

    #[test]
    fn test_catalogue_lookup() {
        let cat = Catalogue::from_courses([course(1, 5), course(2, 5)]);
        assert_eq!(cat.len(), 2);
        assert!(cat.lookup(1).is_some());
        assert!(cat.lookup(3).is_none());
    }
}
