//! Physical door buttons.

use crate::debounce::Debouncer;
use doorlock_bus::{BusError, MessageBus};
use doorlock_core::constants::{DEFAULT_BUTTON_DEBOUNCE_MS, TOPIC_DEVICE_COMMAND};
use doorlock_protocol::DeviceCommand;
use std::time::Duration;
use tracing::{debug, info};

/// A push button wired to the lock, publishing one command per press.
///
/// The edge source (GPIO interrupt or similar) calls [`press`](Self::press)
/// on every falling edge; contact bounce within the debounce window is
/// dropped.
#[derive(Debug)]
pub struct DoorButton<B> {
    bus: B,
    topic: String,
    command: DeviceCommand,
    debouncer: Debouncer,
}

impl<B: MessageBus> DoorButton<B> {
    /// Button publishing `command`, e.g. `unlock` on the inside panel.
    pub fn new(bus: B, command: DeviceCommand) -> Self {
        Self {
            bus,
            topic: TOPIC_DEVICE_COMMAND.to_string(),
            command,
            debouncer: Debouncer::new(Duration::from_millis(DEFAULT_BUTTON_DEBOUNCE_MS)),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debouncer = Debouncer::new(window);
        self
    }

    /// Handle one edge. Returns `Ok(false)` if it was contact bounce.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the command could not be published.
    pub async fn press(&mut self) -> Result<bool, BusError> {
        if !self.debouncer.accept() {
            debug!(command = %self.command, "Button bounce ignored");
            return Ok(false);
        }

        info!(command = %self.command, "Button pressed");
        self.bus
            .publish(&self.topic, &self.command.to_string())
            .await?;
        Ok(true)
    }
}
