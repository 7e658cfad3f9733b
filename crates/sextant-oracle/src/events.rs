//! Price-update notification bus.
//!
//! Every recorded observation is published as a [`PriceUpdated`] event.
//! Subscribers each get an independent buffer; a subscriber that falls more
//! than `capacity` events behind loses the oldest ones. Publishing never
//! blocks and succeeds with no subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sextant_types::PriceUpdated;
use tokio::sync::broadcast;

/// Default per-subscriber buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 1_024;

/// Broadcast bus for [`PriceUpdated`] events.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<PriceUpdated>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: PriceUpdated) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PriceUpdated> {
        self.sender.subscribe()
    }

    /// Number of events published so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
