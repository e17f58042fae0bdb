//! Single-flight coordination of token refreshes.
//!
//! The first request that fails with an expired token becomes the leader and
//! performs the refresh. Requests failing while that refresh is in flight are
//! queued and complete with the leader's outcome. The flag and the queue share
//! one mutex so test-and-set and drain-and-reset are each a single critical
//! section.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::errors::ClientError;

/// New access token, or the error every waiter is rejected with
pub(crate) type RefreshOutcome = std::result::Result<String, ClientError>;

#[derive(Debug, Default)]
struct RefreshQueue {
    refreshing: bool,
    pending: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Debug, Default)]
pub(crate) struct RefreshState {
    queue: Mutex<RefreshQueue>,
}

/// Role assigned to a request that failed with an expired token
pub(crate) enum Ticket<'a> {
    /// No refresh was in flight; the holder must perform it and settle the lease
    Leader(RefreshLease<'a>),
    /// A refresh is in flight; await its outcome
    Follower(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshState {
    fn lock(&self) -> MutexGuard<'_, RefreshQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn begin(&self) -> Ticket<'_> {
        let mut queue = self.lock();

        if queue.refreshing {
            let (tx, rx) = oneshot::channel();
            queue.pending.push_back(tx);
            return Ticket::Follower(rx);
        }

        queue.refreshing = true;
        Ticket::Leader(RefreshLease {
            state: self,
            settled: false,
        })
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let pending = {
            let mut queue = self.lock();
            queue.refreshing = false;
            std::mem::take(&mut queue.pending)
        };

        let count = pending.len();
        for waiter in pending {
            // A waiter whose caller went away is simply skipped
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

/// Proof that the holder owns the in-flight refresh
///
/// Dropping an unsettled lease (the leader's future was cancelled) rejects the
/// queue with [`ClientError::RefreshAborted`] so waiters are never stranded.
pub(crate) struct RefreshLease<'a> {
    state: &'a RefreshState,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Clear the refreshing flag and release every queued request in FIFO order.
    /// Returns how many waiters were released.
    pub(crate) fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.state.settle(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Token refresh dropped before settling, rejecting queued requests");
            self.state.settle(&Err(ClientError::RefreshAborted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_leader(ticket: Ticket<'_>) -> RefreshLease<'_> {
        match ticket {
            Ticket::Leader(lease) => lease,
            Ticket::Follower(_) => panic!("expected leader"),
        }
    }

    fn expect_follower(ticket: Ticket<'_>) -> oneshot::Receiver<RefreshOutcome> {
        match ticket {
            Ticket::Follower(rx) => rx,
            Ticket::Leader(_) => panic!("expected follower"),
        }
    }

    #[tokio::test]
    async fn test_only_first_caller_leads() {
        let state = RefreshState::default();

        let lease = expect_leader(state.begin());
        assert!(state.is_refreshing());

        let a = expect_follower(state.begin());
        let b = expect_follower(state.begin());
        assert_eq!(state.pending_len(), 2);

        assert_eq!(lease.settle(&Ok("T2".to_string())), 2);
        assert!(!state.is_refreshing());
        assert_eq!(state.pending_len(), 0);

        assert_eq!(a.await.unwrap().unwrap(), "T2");
        assert_eq!(b.await.unwrap().unwrap(), "T2");
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let state = RefreshState::default();
        let lease = expect_leader(state.begin());
        let waiters: Vec<_> = (0..3).map(|_| expect_follower(state.begin())).collect();

        lease.settle(&Err(ClientError::InvalidResponse("refresh failed".to_string())));

        for waiter in waiters {
            assert!(matches!(
                waiter.await.unwrap(),
                Err(ClientError::InvalidResponse(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_new_window_after_settle() {
        let state = RefreshState::default();
        expect_leader(state.begin()).settle(&Ok("T2".to_string()));

        let lease = expect_leader(state.begin());
        assert!(state.is_refreshing());
        lease.settle(&Ok("T3".to_string()));
    }

    #[tokio::test]
    async fn test_dropped_lease_aborts_waiters() {
        let state = RefreshState::default();
        let lease = expect_leader(state.begin());
        let waiter = expect_follower(state.begin());

        drop(lease);

        assert!(!state.is_refreshing());
        assert!(matches!(
            waiter.await.unwrap(),
            Err(ClientError::RefreshAborted)
        ));
    }

    #[tokio::test]
    async fn test_dropped_waiter_does_not_block_others() {
        let state = RefreshState::default();
        let lease = expect_leader(state.begin());
        let mut waiters: Vec<_> = (0..4).map(|_| expect_follower(state.begin())).collect();

        // Dropping the first receiver must not disturb the others
        waiters.remove(0);
        assert_eq!(lease.settle(&Ok("T2".to_string())), 4);

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().unwrap(), "T2");
        }
    }
}
