//! DispatchHub: real-time event fan-out
//!
//! ```text
//! AssignmentCoordinator / DispatchManager
//!       │ publish_assignment(rider_id)      publish_status_changed
//!       ▼                                          ▼
//! riders: rider_id → RiderSlot (mpsc)       broadcast::Sender
//!       │                                          │
//!       └──────────────► WS session ◄──────────────┘
//! ```
//!
//! Delivery is at-most-once: nothing is persisted, offline riders miss
//! events, and a lagging session drops broadcast events. Clients reconcile
//! by re-fetching orders on (re)connect.

use dashmap::DashMap;
use shared::message::DispatchEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};

/// Broadcast channel capacity for status changes
const BROADCAST_CAPACITY: usize = 256;

/// Per-rider queue capacity for assignment events
pub const RIDER_QUEUE_CAPACITY: usize = 32;

/// The one connection currently registered for a rider
struct RiderSlot {
    connection_id: u64,
    tx: mpsc::Sender<DispatchEvent>,
}

struct HubInner {
    riders: DashMap<String, RiderSlot>,
    status_tx: broadcast::Sender<DispatchEvent>,
    next_connection: AtomicU64,
}

#[derive(Clone)]
pub struct DispatchHub {
    inner: Arc<HubInner>,
}

impl Default for DispatchHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHub")
            .field("riders_online", &self.inner.riders.len())
            .field("subscribers", &self.inner.status_tx.receiver_count())
            .finish()
    }
}

impl DispatchHub {
    pub fn new() -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(HubInner {
                riders: DashMap::new(),
                status_tx,
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Fresh id for a new session
    pub fn next_connection_id(&self) -> u64 {
        self.inner.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Route `rider_id`'s assignment events to this connection
    ///
    /// Latest wins: a newer connection replaces whatever was registered.
    pub fn register_rider(
        &self,
        rider_id: &str,
        connection_id: u64,
        tx: mpsc::Sender<DispatchEvent>,
    ) {
        let replaced = self
            .inner
            .riders
            .insert(rider_id.to_string(), RiderSlot { connection_id, tx });
        match replaced {
            Some(old) if old.connection_id != connection_id => tracing::info!(
                rider_id = %rider_id,
                connection_id,
                replaced_connection = old.connection_id,
                "Rider re-registered on a new connection"
            ),
            _ => tracing::info!(rider_id = %rider_id, connection_id, "Rider registered"),
        }
    }

    /// Drop the registration if it still belongs to `connection_id`
    ///
    /// Returns whether a slot was removed. A disconnect from an older
    /// connection never evicts a newer registration.
    pub fn unregister(&self, rider_id: &str, connection_id: u64) -> bool {
        let removed = self
            .inner
            .riders
            .remove_if(rider_id, |_, slot| slot.connection_id == connection_id)
            .is_some();
        if removed {
            tracing::info!(rider_id = %rider_id, connection_id, "Rider unregistered");
        }
        removed
    }

    /// Send an assignment event to the rider's current connection
    ///
    /// Returns false when the rider is offline or its queue is full.
    pub fn publish_assignment(&self, rider_id: &str, event: DispatchEvent) -> bool {
        let Some(slot) = self.inner.riders.get(rider_id) else {
            return false;
        };
        match slot.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(rider_id = %rider_id, "Rider queue full, assignment event dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Broadcast a status change to every connected session
    ///
    /// Returns the number of receivers the event reached.
    pub fn publish_status_changed(&self, event: DispatchEvent) -> usize {
        // No subscribers is not an error
        self.inner.status_tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.inner.status_tx.subscribe()
    }

    pub fn online_riders(&self) -> Vec<String> {
        let mut riders: Vec<String> = self.inner.riders.iter().map(|e| e.key().clone()).collect();
        riders.sort();
        riders
    }

    pub fn is_online(&self, rider_id: &str) -> bool {
        self.inner.riders.contains_key(rider_id)
    }
}
