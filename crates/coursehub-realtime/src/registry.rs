//! The session registry: user id → live session handle.
//!
//! Used by the session machinery for single-session preemption and
//! teardown, and by the mode controller for mass disconnects and
//! `START`/`STOP` broadcasts.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Handle to one live session.
///
/// The handle is join-capable: `cancel` asks the session to stop, and
/// `finished` resolves once the session has actually torn down, so a
/// preempting login can wait for the old session to leave the
/// subscriber tables before proceeding.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    finished: CancellationToken,
    outbound: mpsc::Sender<String>,
}

impl SessionHandle {
    /// Create a handle around a session's outbound frame queue.
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            outbound,
        }
    }

    /// Unique identity, used for compare-and-delete.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the session to stop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolve when cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// A clone of the cancellation token, for the session's helper tasks.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Record that the session has fully torn down. Idempotent.
    pub fn mark_finished(&self) {
        self.finished.cancel();
    }

    /// Resolve once the session has fully torn down.
    pub async fn finished(&self) {
        self.finished.cancelled().await;
    }

    /// Queue a frame on the session's outbound channel without
    /// blocking. Returns `false` when the queue is full or closed.
    pub fn notify(&self, frame: String) -> bool {
        self.outbound.try_send(frame).is_ok()
    }
}

/// Concurrent map of user id → active session handle.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handle for a user, returning the displaced prior
    /// handle if one was present.
    pub fn install(&self, userid: &str, handle: SessionHandle) -> Option<SessionHandle> {
        self.sessions.insert(userid.to_string(), handle)
    }

    /// Remove the user's entry iff it still holds the given handle.
    pub fn compare_and_delete(&self, userid: &str, handle: &SessionHandle) -> bool {
        self.sessions
            .remove_if(userid, |_, current| current.id() == handle.id())
            .is_some()
    }

    /// Cancel every live session (mode → closed).
    pub fn cancel_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().cancel();
        }
    }

    /// Queue a frame on every live session's outbound channel.
    /// Returns the number of sessions reached.
    pub fn broadcast(&self, frame: &str) -> usize {
        let mut delivered = 0;
        for entry in self.sessions.iter() {
            if entry.value().notify(frame.to_string()) {
                delivered += 1;
            } else {
                warn!(userid = %entry.key(), "broadcast frame dropped: outbound queue full or closed");
            }
        }
        delivered
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_pair() -> (SessionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(4);
        (SessionHandle::new(tx), rx)
    }

    #[test]
    fn test_install_returns_prior() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = handle_pair();
        let (second, _rx2) = handle_pair();

        assert!(registry.install("alice", first.clone()).is_none());
        let prior = registry.install("alice", second).expect("prior handle");
        assert_eq!(prior.id(), first.id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_compare_and_delete_only_removes_own_handle() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = handle_pair();
        let (second, _rx2) = handle_pair();

        registry.install("alice", first.clone());
        registry.install("alice", second.clone());

        // The preempted session must not remove its replacement.
        assert!(!registry.compare_and_delete("alice", &first));
        assert_eq!(registry.len(), 1);
        assert!(registry.compare_and_delete("alice", &second));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_all() {
        let registry = SessionRegistry::new();
        let (a, _rx1) = handle_pair();
        let (b, _rx2) = handle_pair();
        registry.install("alice", a.clone());
        registry.install("bob", b.clone());

        registry.cancel_all();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[test]
    fn test_broadcast_reaches_queues() {
        let registry = SessionRegistry::new();
        let (a, mut rx1) = handle_pair();
        let (b, mut rx2) = handle_pair();
        registry.install("alice", a);
        registry.install("bob", b);

        assert_eq!(registry.broadcast("STOP"), 2);
        assert_eq!(rx1.try_recv().unwrap(), "STOP");
        assert_eq!(rx2.try_recv().unwrap(), "STOP");
    }

    #[tokio::test]
    async fn test_handle_join() {
        let (handle, _rx) = handle_pair();
        let waiter = handle.clone();
        let join = tokio::spawn(async move { waiter.finished().await });
        handle.mark_finished();
        join.await.expect("join");
    }

    #[test]
    fn test_double_cancel_is_idempotent() {
        let (handle, _rx) = handle_pair();
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }
}
