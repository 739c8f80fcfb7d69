//! Request/response correlation over the socket.
//!
//! Every outbound command is registered under its numeric id before it is
//! sent. The pending entry settles exactly once: from the matching
//! `result` frame, from its deadline timer, or from the bulk sweep that
//! runs when the transport drops. Resolving an unknown or already-settled
//! id is a silent no-op, which absorbs duplicate and late frames.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Error;

/// Default deadline for a pending request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome delivered to the waiter of a pending request.
pub type Settlement = Result<Value, Error>;

struct PendingRequest {
    tx: oneshot::Sender<Settlement>,
    deadline: Instant,
    timer: JoinHandle<()>,
}

/// Tracks in-flight requests keyed purely by id.
///
/// Cheaply cloneable; clones share the same pending table.
#[derive(Clone, Default)]
pub struct RequestCorrelator {
    pending: Arc<DashMap<u64, PendingRequest>>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and arm its deadline timer.
    ///
    /// Must be called from within a Tokio runtime. If `id` is already
    /// pending, the older entry settles with [`Error::DuplicateRequestId`].
    pub fn register(&self, id: u64, timeout: Duration) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + timeout;

        let table = Arc::downgrade(&self.pending);
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            expire(&table, id, timeout);
        });

        let previous = self.pending.insert(
            id,
            PendingRequest {
                tx,
                deadline,
                timer,
            },
        );
        if let Some(old) = previous {
            old.timer.abort();
            let _ = old.tx.send(Err(Error::DuplicateRequestId(id)));
        }

        PendingResponse { id, rx }
    }

    /// Settle a pending request. Returns `false` if `id` was not pending.
    pub fn resolve(&self, id: u64, settlement: Settlement) -> bool {
        let Some((_, pending)) = self.pending.remove(&id) else {
            tracing::trace!(request_id = id, "Dropping response for untracked request");
            return false;
        };
        pending.timer.abort();
        // A dropped receiver just means the caller stopped waiting.
        let _ = pending.tx.send(settlement);
        true
    }

    /// Fail every pending request with [`Error::Disconnected`].
    ///
    /// Returns how many requests were settled.
    pub fn fail_all(&self) -> usize {
        let ids: Vec<u64> = self.pending.iter().map(|r| *r.key()).collect();
        let mut failed = 0;
        for id in ids {
            if self.resolve(id, Err(Error::Disconnected)) {
                failed += 1;
            }
        }
        if failed > 0 {
            tracing::debug!(failed, "Failed in-flight requests after disconnect");
        }
        failed
    }

    /// Deadline of a pending request, if it is still pending.
    pub fn deadline(&self, id: u64) -> Option<Instant> {
        self.pending.get(&id).map(|r| r.deadline)
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn expire(table: &Weak<DashMap<u64, PendingRequest>>, id: u64, timeout: Duration) {
    let Some(table) = table.upgrade() else {
        return;
    };
    if let Some((_, pending)) = table.remove(&id) {
        tracing::debug!(request_id = id, "Request deadline elapsed");
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let _ = pending.tx.send(Err(Error::Timeout { timeout_ms }));
    }
}

/// Waiter side of a registered request.
#[derive(Debug)]
pub struct PendingResponse {
    id: u64,
    rx: oneshot::Receiver<Settlement>,
}

impl PendingResponse {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the settlement.
    pub async fn wait(self) -> Settlement {
        self.rx.await.unwrap_or(Err(Error::Disconnected))
    }

    /// Non-blocking check; `None` while still pending.
    pub fn try_settlement(&mut self) -> Option<Settlement> {
        match self.rx.try_recv() {
            Ok(settlement) => Some(settlement),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::Disconnected)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn resolves_matching_id() {
        let correlator = RequestCorrelator::new();
        let pending = correlator.register(1, DEFAULT_REQUEST_TIMEOUT);

        assert!(correlator.resolve(1, Ok(json!({ "ok": true }))));
        assert_eq!(pending.wait().await.unwrap()["ok"], true);
        assert!(correlator.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_resolve_is_a_noop() {
        let correlator = RequestCorrelator::new();
        let mut pending = correlator.register(5, DEFAULT_REQUEST_TIMEOUT);

        assert!(correlator.resolve(5, Ok(json!(1))));
        assert!(!correlator.resolve(5, Ok(json!(2))));
        assert_eq!(pending.try_settlement().unwrap().unwrap(), json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_id_is_ignored() {
        let correlator = RequestCorrelator::new();
        assert!(!correlator.resolve(99, Ok(Value::Null)));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_responses_match_by_id() {
        let correlator = RequestCorrelator::new();
        let first = correlator.register(10, DEFAULT_REQUEST_TIMEOUT);
        let second = correlator.register(11, DEFAULT_REQUEST_TIMEOUT);

        correlator.resolve(11, Ok(json!("b")));
        correlator.resolve(10, Ok(json!("a")));

        assert_eq!(first.wait().await.unwrap(), json!("a"));
        assert_eq!(second.wait().await.unwrap(), json!("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_settles_with_timeout() {
        let correlator = RequestCorrelator::new();
        let pending = correlator.register(3, Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(6)).await;
        let result = pending.wait().await;
        assert!(matches!(result, Err(Error::Timeout { timeout_ms: 5000 })));
        assert!(!correlator.is_pending(3));
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_timeout_is_dropped() {
        let correlator = RequestCorrelator::new();
        let pending = correlator.register(4, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(pending.wait().await.is_err());

        assert!(!correlator.resolve(4, Ok(json!("late"))));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_sweep_fails_everything_at_once() {
        let correlator = RequestCorrelator::new();
        let mut a = correlator.register(1, DEFAULT_REQUEST_TIMEOUT);
        let mut b = correlator.register(2, DEFAULT_REQUEST_TIMEOUT);
        let mut c = correlator.register(3, DEFAULT_REQUEST_TIMEOUT);

        assert_eq!(correlator.fail_all(), 3);

        for pending in [&mut a, &mut b, &mut c] {
            let settled = pending.try_settlement().expect("settled in the same tick");
            assert!(matches!(settled, Err(Error::Disconnected)));
        }
        assert!(correlator.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reused_id_fails_the_older_waiter() {
        let correlator = RequestCorrelator::new();
        let older = correlator.register(8, DEFAULT_REQUEST_TIMEOUT);
        let newer = correlator.register(8, DEFAULT_REQUEST_TIMEOUT);

        assert!(matches!(
            older.wait().await,
            Err(Error::DuplicateRequestId(8))
        ));
        correlator.resolve(8, Ok(json!("fresh")));
        assert_eq!(newer.wait().await.unwrap(), json!("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_deadline() {
        let correlator = RequestCorrelator::new();
        let start = Instant::now();
        let _pending = correlator.register(12, Duration::from_secs(30));
        assert_eq!(
            correlator.deadline(12).unwrap(),
            start + Duration::from_secs(30)
        );
    }
}
