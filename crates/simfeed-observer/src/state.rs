//! Shared application state for the observer server.
//!
//! [`AppState`] holds the live [`SharedStore`] that the REST endpoints read
//! and the broadcast channel that carries each tick's [`Snapshot`] to
//! connected `WebSocket` clients. It is also the scheduler's push target:
//! publishing a snapshot is a non-blocking broadcast send.

use std::sync::Arc;

use simfeed_core::scheduler::Publisher;
use simfeed_core::store::{SharedStore, Snapshot, Store};
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the snapshot broadcast channel.
///
/// A subscriber that falls behind by more than this many snapshots receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest one.
pub const BROADCAST_CAPACITY: usize = 64;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// The live store, written by the scheduler once per tick.
    pub store: SharedStore,
    /// Broadcast sender for per-tick snapshots.
    pub tx: broadcast::Sender<Arc<Snapshot>>,
}

impl AppState {
    /// Create state around an existing shared store.
    pub fn new(store: SharedStore) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { store, tx }
    }

    /// Subscribe to the snapshot stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// Send a snapshot to every subscriber.
    ///
    /// Returns the number of receivers reached, 0 when nobody is connected.
    pub fn broadcast(&self, snapshot: Arc<Snapshot>) -> usize {
        // send fails only when there are no receivers
        self.tx.send(snapshot).unwrap_or(0)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Store::new().into_shared())
    }
}

impl Publisher for AppState {
    fn publish(&self, snapshot: Arc<Snapshot>) {
        let tick = snapshot.tick;
        let receivers = self.broadcast(snapshot);
        trace!(tick, receivers, "Snapshot broadcast");
    }
}
