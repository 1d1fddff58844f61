// ── Snapshot cache ──
//
// Single-value store for the latest trip snapshot plus the flags consumers
// render. Every write is a whole-value replacement published through a
// `watch` channel; there is no history.
//
// Each enabled session writes through a `CacheWriter` stamped with the
// session epoch. Teardown bumps the epoch, so a late write from a session
// that is shutting down is silently dropped.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use fleetwatch_api::TripSnapshot;
use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::error::SubscriptionError;
use crate::state::ConnectionState;
use crate::target::TripId;

/// Everything a consumer can observe about one subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotState {
    /// Latest snapshot, replaced wholesale on every update.
    pub snapshot: Option<Arc<TripSnapshot>>,
    /// `true` only while an initial fetch (or refetch) is in flight.
    pub is_loading: bool,
    /// Most recent surfaced error, cleared by the next good snapshot.
    pub error: Option<SubscriptionError>,
    pub connection: ConnectionState,
    /// When `snapshot` was last replaced.
    pub updated_at: Option<DateTime<Utc>>,
    pub target: Option<TripId>,
    epoch: u64,
}

impl SnapshotState {
    /// `true` only while the socket is open and acknowledged.
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

/// Shared owner of the published [`SnapshotState`].
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    tx: Arc<watch::Sender<SnapshotState>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SnapshotState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Clone of the current state.
    pub fn current(&self) -> SnapshotState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.tx.subscribe())
    }

    /// Start a new session for `target` and hand back its writer.
    ///
    /// Switching to a different target drops the old snapshot and error;
    /// re-enabling the same target keeps the last snapshot visible.
    pub fn begin_session(&self, target: TripId) -> CacheWriter {
        let mut epoch = 0;
        self.tx.send_modify(|state| {
            state.epoch += 1;
            epoch = state.epoch;
            if state.target.as_ref() != Some(&target) {
                state.snapshot = None;
                state.updated_at = None;
                state.error = None;
            }
            state.target = Some(target);
            state.is_loading = false;
            state.connection = ConnectionState::Disconnected;
        });
        CacheWriter {
            tx: Arc::clone(&self.tx),
            epoch,
        }
    }

    /// Invalidate the running session's writer and reset live flags.
    /// The last snapshot stays visible.
    pub fn end_session(&self) {
        self.tx.send_modify(|state| {
            state.epoch += 1;
            state.is_loading = false;
            state.connection = ConnectionState::Disconnected;
        });
    }

    /// Point the cache at another target (or none) without starting a
    /// session. Clears state that belonged to the previous target.
    pub fn retarget(&self, target: Option<TripId>) {
        self.tx.send_if_modified(|state| {
            if state.target == target {
                return false;
            }
            state.epoch += 1;
            state.target = target;
            state.snapshot = None;
            state.updated_at = None;
            state.error = None;
            state.is_loading = false;
            state.connection = ConnectionState::Disconnected;
            true
        });
    }

    /// Writer bound to whatever session is current right now.
    pub(crate) fn writer(&self) -> CacheWriter {
        CacheWriter {
            tx: Arc::clone(&self.tx),
            epoch: self.tx.borrow().epoch,
        }
    }

    /// Surface an error outside any session (e.g. missing endpoint).
    pub(crate) fn set_error(&self, error: SubscriptionError) {
        self.writer().set_error(error);
    }
}

/// Epoch-guarded write handle held by one session.
///
/// Every method returns `false` (and changes nothing) once the session it
/// belongs to has been torn down.
#[derive(Debug, Clone)]
pub struct CacheWriter {
    tx: Arc<watch::Sender<SnapshotState>>,
    epoch: u64,
}

impl CacheWriter {
    fn update(&self, f: impl FnOnce(&mut SnapshotState)) -> bool {
        self.tx.send_if_modified(|state| {
            if state.epoch != self.epoch {
                return false;
            }
            f(state);
            true
        })
    }

    /// Whether the owning session is still the live one.
    pub fn is_current(&self) -> bool {
        self.tx.borrow().epoch == self.epoch
    }

    pub fn set_loading(&self, loading: bool) -> bool {
        self.update(|state| state.is_loading = loading)
    }

    /// Replace the snapshot and clear any error.
    ///
    /// Returns the stored snapshot, or `None` if this writer is stale.
    pub fn replace_snapshot(&self, snapshot: TripSnapshot) -> Option<Arc<TripSnapshot>> {
        let snapshot = Arc::new(snapshot);
        let applied = self.update(|state| {
            state.snapshot = Some(Arc::clone(&snapshot));
            state.updated_at = Some(Utc::now());
            state.error = None;
        });
        applied.then_some(snapshot)
    }

    /// Record the outcome of an initial fetch or refetch. A failure keeps
    /// the previous snapshot.
    pub fn apply_fetch(&self, result: Result<TripSnapshot, SubscriptionError>) -> bool {
        self.update(|state| {
            state.is_loading = false;
            match result {
                Ok(snapshot) => {
                    state.snapshot = Some(Arc::new(snapshot));
                    state.updated_at = Some(Utc::now());
                    state.error = None;
                }
                Err(error) => state.error = Some(error),
            }
        })
    }

    pub fn set_error(&self, error: SubscriptionError) -> bool {
        self.update(|state| state.error = Some(error))
    }

    /// Record a dropped socket and the state the machine moved to, in one
    /// write. Readers never see the error next to a stale `Connected`.
    pub fn connection_lost(&self, connection: ConnectionState, error: SubscriptionError) -> bool {
        self.update(|state| {
            state.connection = connection;
            state.error = Some(error);
        })
    }

    pub fn set_connection(&self, connection: ConnectionState) -> bool {
        self.update(|state| {
            if connection == ConnectionState::Connected
                && state.error.as_ref().is_some_and(SubscriptionError::is_connection_error)
            {
                state.error = None;
            }
            state.connection = connection;
        })
    }
}

// ── Consumer-facing stream ───────────────────────────────────────────

/// A subscription to the cache.
///
/// Provides point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream {
    current: SnapshotState,
    receiver: watch::Receiver<SnapshotState>,
}

impl SnapshotStream {
    fn new(receiver: watch::Receiver<SnapshotState>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// State captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &SnapshotState {
        &self.current
    }

    /// Latest state, which may have moved on since `current`.
    pub fn latest(&self) -> SnapshotState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<SnapshotState> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().clone();
        self.current = state.clone();
        Some(state)
    }

    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding every published [`SnapshotState`].
pub struct SnapshotWatchStream {
    inner: WatchStream<SnapshotState>,
}

impl Stream for SnapshotWatchStream {
    type Item = SnapshotState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use fleetwatch_api::SeatCounters;
    use pretty_assertions::assert_eq;

    use super::*;

    fn snapshot(occupied: u32) -> TripSnapshot {
        TripSnapshot {
            capacity: SeatCounters {
                total_seats: 40,
                occupied_seats: occupied,
                ..SeatCounters::default()
            },
            ..TripSnapshot::default()
        }
    }

    #[test]
    fn replace_clears_error() {
        let cache = SnapshotCache::new();
        let writer = cache.begin_session(TripId::from("trip-42"));
        writer.set_error(SubscriptionError::Protocol("boom".into()));

        let stored = writer.replace_snapshot(snapshot(10)).unwrap();

        let state = cache.current();
        assert_eq!(state.snapshot.as_deref(), Some(&*stored));
        assert!(state.error.is_none());
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn failed_fetch_keeps_previous_snapshot() {
        let cache = SnapshotCache::new();
        let writer = cache.begin_session(TripId::from("trip-42"));
        writer.set_loading(true);
        writer.apply_fetch(Ok(snapshot(10)));
        writer.set_loading(true);
        writer.apply_fetch(Err(SubscriptionError::Fetch("502".into())));

        let state = cache.current();
        assert!(!state.is_loading);
        assert_eq!(state.snapshot.unwrap().capacity.occupied_seats, 10);
        assert_eq!(state.error, Some(SubscriptionError::Fetch("502".into())));
    }

    #[test]
    fn stale_writer_is_ignored() {
        let cache = SnapshotCache::new();
        let old = cache.begin_session(TripId::from("trip-42"));
        cache.end_session();

        assert!(!old.is_current());
        assert!(old.replace_snapshot(snapshot(1)).is_none());
        assert!(!old.set_connection(ConnectionState::Connected));
        assert!(cache.current().snapshot.is_none());
    }

    #[test]
    fn new_target_drops_old_snapshot() {
        let cache = SnapshotCache::new();
        cache
            .begin_session(TripId::from("trip-1"))
            .replace_snapshot(snapshot(3));

        cache.begin_session(TripId::from("trip-1"));
        assert!(cache.current().snapshot.is_some(), "same target keeps snapshot");

        cache.begin_session(TripId::from("trip-2"));
        let state = cache.current();
        assert!(state.snapshot.is_none());
        assert_eq!(state.target, Some(TripId::from("trip-2")));
    }

    #[test]
    fn ack_clears_only_connection_errors() {
        let cache = SnapshotCache::new();
        let writer = cache.begin_session(TripId::from("trip-42"));

        writer.set_error(SubscriptionError::Transport("reset".into()));
        writer.set_connection(ConnectionState::Connected);
        assert!(cache.current().error.is_none());

        writer.set_error(SubscriptionError::Fetch("502".into()));
        writer.set_connection(ConnectionState::Connected);
        assert!(cache.current().error.is_some());
    }

    #[tokio::test]
    async fn lost_connection_is_one_change() {
        let cache = SnapshotCache::new();
        let writer = cache.begin_session(TripId::from("trip-42"));
        writer.set_connection(ConnectionState::Connected);
        let mut stream = cache.subscribe();

        writer.connection_lost(
            ConnectionState::Reconnecting { attempt: 1 },
            SubscriptionError::Transport("reset".into()),
        );

        let state = stream.changed().await.unwrap();
        assert!(!state.is_connected());
        assert_eq!(state.connection, ConnectionState::Reconnecting { attempt: 1 });
        assert_eq!(state.error, Some(SubscriptionError::Transport("reset".into())));
    }

    #[test]
    fn retarget_to_same_target_is_noop() {
        let cache = SnapshotCache::new();
        let writer = cache.begin_session(TripId::from("trip-1"));
        cache.retarget(Some(TripId::from("trip-1")));
        assert!(writer.is_current());

        cache.retarget(None);
        assert!(!writer.is_current());
        assert_eq!(cache.current().target, None);
    }

    #[tokio::test]
    async fn stream_sees_whole_value_replacements() {
        let cache = SnapshotCache::new();
        let writer = cache.begin_session(TripId::from("trip-42"));
        let mut stream = cache.subscribe();
        assert!(stream.current().snapshot.is_none());

        writer.replace_snapshot(snapshot(15));
        let state = stream.changed().await.unwrap();
        assert_eq!(state.snapshot.unwrap().capacity.occupied_seats, 15);
        assert_eq!(stream.latest().snapshot.unwrap().capacity.total_seats, 40);
    }
}
