//! The coalescing update signal.
//!
//! A single-slot, non-blocking, edge-triggered wake-up: `set` marks the
//! slot idempotently, `wait` clears it and returns. Any number of sets
//! between two waits collapse into one wake, which is what keeps a
//! popular course from flooding its subscribers.

use tokio::sync::mpsc;

/// Create a connected signal/waiter pair.
pub fn update_signal() -> (UpdateSignal, UpdateWaiter) {
    let (tx, rx) = mpsc::channel(1);
    (UpdateSignal { slot: tx }, UpdateWaiter { slot: rx })
}

/// The set side of the signal, held in a course's subscriber table.
#[derive(Debug, Clone)]
pub struct UpdateSignal {
    slot: mpsc::Sender<()>,
}

impl UpdateSignal {
    /// Mark the slot. A no-op when the slot is already marked or the
    /// waiter is gone.
    pub fn set(&self) {
        let _ = self.slot.try_send(());
    }
}

/// The wait side of the signal, owned by a session's forwarder task.
#[derive(Debug)]
pub struct UpdateWaiter {
    slot: mpsc::Receiver<()>,
}

impl UpdateWaiter {
    /// Wait for the slot to be marked, then clear it.
    ///
    /// Returns `false` when every [`UpdateSignal`] clone has been
    /// dropped and no mark is pending.
    pub async fn wait(&mut self) -> bool {
        self.slot.recv().await.is_some()
    }

    /// Clear the slot without waiting; `true` when a mark was pending.
    pub fn try_wait(&mut self) -> bool {
        self.slot.try_recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_wakes_waiter() {
        let (signal, mut waiter) = update_signal();
        signal.set();
        assert!(waiter.wait().await);
    }

    #[tokio::test]
    async fn test_redundant_sets_coalesce() {
        let (signal, mut waiter) = update_signal();
        for _ in 0..10 {
            signal.set();
        }
        assert!(waiter.wait().await);
        // The slot is clear again: a fresh set produces exactly one more wake.
        signal.set();
        signal.set();
        assert!(waiter.wait().await);
        drop(signal);
        assert!(!waiter.wait().await);
    }

    #[tokio::test]
    async fn test_wait_ends_when_signal_dropped() {
        let (signal, mut waiter) = update_signal();
        drop(signal);
        assert!(!waiter.wait().await);
    }
}
