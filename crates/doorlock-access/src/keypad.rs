//! Consumer loop for `device/keypad`.

use doorlock_bus::{BusError, MessageBus};
use doorlock_core::CredentialInput;
use doorlock_core::constants::{DEFAULT_PIN_LENGTH, TOPIC_KEYPAD};
use doorlock_protocol::{PinBuffer, PinEntry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Buffers key presses and sends each complete PIN as a credential.
pub struct KeypadListener<B> {
    bus: B,
    topic: String,
    buffer: PinBuffer,
    credentials: mpsc::Sender<CredentialInput>,
}

impl<B: MessageBus> KeypadListener<B> {
    pub fn new(bus: B, credentials: mpsc::Sender<CredentialInput>) -> Self {
        Self {
            bus,
            topic: TOPIC_KEYPAD.to_string(),
            buffer: PinBuffer::new(DEFAULT_PIN_LENGTH),
            credentials,
        }
    }

    pub fn with_pin_length(mut self, length: usize) -> Self {
        self.buffer = PinBuffer::new(length);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Subscribe and process key presses until the bus goes away.
    pub async fn run(mut self) -> Result<(), BusError> {
        let mut keys = self.bus.subscribe(&self.topic).await?;
        info!(topic = %self.topic, "Keypad listener started");

        while let Some(message) = keys.recv().await {
            self.handle(&message.payload).await;
        }

        info!("Keypad listener stopped");
        Ok(())
    }

    /// Process one key id.
    pub async fn handle(&mut self, key_id: &str) {
        match self.buffer.push_key_id(key_id) {
            PinEntry::Pending { entered } => debug!(entered, "Key accepted"),
            PinEntry::Rejected => warn!(key_id, "Unknown key id, PIN entry cleared"),
            PinEntry::Complete(pin) => {
                info!("PIN entered");
                if self.credentials.send(CredentialInput::Pin(pin)).await.is_err() {
                    warn!("Access coordinator gone, PIN dropped");
                }
            }
        }
    }
}
