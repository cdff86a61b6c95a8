//! Consumer loop for `device/fingerprint-events`.

use crate::correlator::CommandCorrelator;
use doorlock_bus::{BusError, EventLog, MessageBus};
use doorlock_core::constants::TOPIC_FINGERPRINT_EVENTS;
use doorlock_core::{CredentialInput, FingerprintResult};
use doorlock_protocol::{SensorEvent, SensorStatus, decode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Decodes sensor lines and routes each event to its consumer.
///
/// | Event | Destination |
/// |---|---|
/// | positive `Match` | credential channel, as a fingerprint factor |
/// | `Enroll`, `List` | the [`CommandCorrelator`] |
/// | status, delete, negative match | status log only |
/// | unrecognized | process log only |
pub struct FingerprintListener<B> {
    topic: String,
    correlator: CommandCorrelator<B>,
    credentials: mpsc::Sender<CredentialInput>,
    log: EventLog<B>,
}

impl<B: MessageBus> FingerprintListener<B> {
    pub fn new(
        correlator: CommandCorrelator<B>,
        credentials: mpsc::Sender<CredentialInput>,
        log: EventLog<B>,
    ) -> Self {
        Self {
            topic: TOPIC_FINGERPRINT_EVENTS.to_string(),
            correlator,
            credentials,
            log,
        }
    }

    /// Listen on a topic other than `device/fingerprint-events`.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Subscribe and process events until the bus goes away.
    ///
    /// # Errors
    ///
    /// Only the initial subscription can fail.
    pub async fn run(self) -> Result<(), BusError> {
        let mut events = self.log.bus().subscribe(&self.topic).await?;
        info!(topic = %self.topic, "Fingerprint listener started");

        while let Some(message) = events.recv().await {
            self.handle(&message.payload).await;
        }

        info!("Fingerprint listener stopped");
        Ok(())
    }

    /// Process one raw sensor line.
    pub async fn handle(&self, raw: &str) {
        let event = decode(raw);
        debug!(kind = event.kind(), "Sensor event");

        if self.correlator.deliver(&event) {
            return;
        }

        match event {
            SensorEvent::Match {
                matched: true,
                id: Some(id),
            } => {
                self.log.record(format!("Fingerprint matched: ID {id}")).await;
                let input = CredentialInput::Fingerprint(FingerprintResult::matched(id));
                if self.credentials.send(input).await.is_err() {
                    warn!(%id, "Access coordinator gone, fingerprint match dropped");
                }
            }
            SensorEvent::Match { .. } => {
                self.log.record("No fingerprint match found").await;
            }
            SensorEvent::SensorStatus(status) => {
                let status = match status {
                    SensorStatus::Ready => "ready",
                    SensorStatus::Error => "error",
                };
                self.log.record(format!("Sensor status: {status}")).await;
            }
            SensorEvent::Delete { id, success } => {
                let outcome = if success { "success" } else { "failed" };
                self.log.record(format!("Delete ID {id} {outcome}")).await;
            }
            SensorEvent::DeleteAll { .. } => {
                self.log.record("All fingerprints deleted").await;
            }
            SensorEvent::Unrecognized(raw) => {
                warn!(payload = %raw, "Unrecognized sensor payload");
            }
            other => {
                debug!(event = %other, "Sensor event not handled");
            }
        }
    }
}
