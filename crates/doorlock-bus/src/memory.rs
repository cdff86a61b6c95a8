//! In-process loopback bus.

use crate::bus::{BusMessage, MessageBus, Subscription};
use crate::{BusError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

/// Broker-less bus that delivers every publish to every matching subscriber
/// in the same process.
///
/// The connection flag can be toggled to exercise the behaviour of callers
/// while the transport is down.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    sender: broadcast::Sender<BusMessage>,
    connected: Arc<AtomicBool>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus whose subscribers may fall `capacity` messages behind
    /// before losing any.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate the transport going down or coming back.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(BusError::Disconnected);
        }

        trace!(topic, payload, "Publishing");
        // No subscribers is not an error: delivery is best effort.
        let _ = self.sender.send(BusMessage::new(topic, payload));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        Ok(Subscription::new(topic, self.sender.subscribe()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
