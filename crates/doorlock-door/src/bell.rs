//! Consumer loop for `device/bell`.

use crate::debounce::Debouncer;
use doorlock_bus::{BusError, EventLog, MessageBus};
use doorlock_core::constants::{BELL_PRESSED, DEFAULT_BELL_COOLDOWN_MS, TOPIC_BELL};
use std::time::Duration;
use tracing::{debug, info};

/// Writes a `Bell pressed` status line per ring, at most once per cooldown.
pub struct BellListener<B> {
    log: EventLog<B>,
    topic: String,
    cooldown: Debouncer,
}

impl<B: MessageBus> BellListener<B> {
    pub fn new(log: EventLog<B>) -> Self {
        Self {
            log,
            topic: TOPIC_BELL.to_string(),
            cooldown: Debouncer::new(Duration::from_millis(DEFAULT_BELL_COOLDOWN_MS)),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Debouncer::new(cooldown);
        self
    }

    /// Subscribe and process bell messages until the bus goes away.
    pub async fn run(mut self) -> Result<(), BusError> {
        let mut rings = self.log.bus().subscribe(&self.topic).await?;
        info!(topic = %self.topic, "Bell listener started");

        while let Some(message) = rings.recv().await {
            self.handle(&message.payload).await;
        }

        info!("Bell listener stopped");
        Ok(())
    }

    /// Process one bell payload. Returns `true` if a notification was logged.
    pub async fn handle(&mut self, payload: &str) -> bool {
        if payload.trim() != BELL_PRESSED {
            debug!(payload, "Unexpected bell message");
            return false;
        }
        if !self.cooldown.accept() {
            debug!("Bell notification skipped due to cooldown");
            return false;
        }

        self.log.record(BELL_PRESSED).await;
        true
    }
}
