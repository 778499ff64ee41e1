//! Fan-out of seat-count updates.
//!
//! When a course's seat count changes, every subscribed session must
//! eventually learn the new value. The notifier marks each subscriber's
//! coalescing signal; per-session forwarder tasks turn those marks into
//! `M` frames, pacing themselves by the global subscription population
//! so that total wake-ups scale sub-linearly with load.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tracing::error;

use crate::catalogue::Course;

/// Tracks the global subscription population and fans updates out.
#[derive(Debug)]
pub struct UpdateNotifier {
    /// Live (session, course) subscription pairs across the process.
    population: AtomicI64,
    /// Right-shift turning the population into a pacing delay in ms.
    delay_shift_bits: u32,
}

impl UpdateNotifier {
    /// Create a notifier with the configured pacing shift.
    pub fn new(delay_shift_bits: u32) -> Self {
        Self {
            population: AtomicI64::new(0),
            delay_shift_bits,
        }
    }

    /// Record that a session subscribed to `n` courses.
    pub fn subscribers_added(&self, n: usize) {
        self.population.fetch_add(n as i64, Ordering::AcqRel);
    }

    /// Record that a session dropped its `n` subscriptions.
    pub fn subscribers_removed(&self, n: usize) {
        self.population.fetch_sub(n as i64, Ordering::AcqRel);
    }

    /// Current subscription population.
    pub fn population(&self) -> i64 {
        self.population.load(Ordering::Acquire)
    }

    /// How long a forwarder sleeps after delivering one update:
    /// `population >> delay_shift_bits` milliseconds.
    pub fn pacing_delay(&self) -> Duration {
        let count = self.population().max(0) as u64;
        Duration::from_millis(count >> self.delay_shift_bits)
    }

    /// Mark every subscriber of the course.
    pub fn propagate(&self, course: &Course) {
        course.signal_subscribers();
    }

    /// Compensation primitive: give the seat back, then notify
    /// subscribers of the corrected count.
    pub fn release_and_propagate(&self, course: &Course) {
        if !course.release_seat() {
            error!(
                course_id = course.id,
                "seat release with a zero counter; counts were already inconsistent"
            );
        }
        self.propagate(course);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_delay_shift() {
        let notifier = UpdateNotifier::new(6);
        notifier.subscribers_added(4096);
        assert_eq!(notifier.pacing_delay(), Duration::from_millis(64));
        notifier.subscribers_removed(4096);
        assert_eq!(notifier.pacing_delay(), Duration::ZERO);
    }

    #[test]
    fn test_pacing_delay_never_negative() {
        let notifier = UpdateNotifier::new(3);
        // An unbalanced removal must not produce a huge delay.
        notifier.subscribers_removed(8);
        assert_eq!(notifier.pacing_delay(), Duration::ZERO);
    }
}
