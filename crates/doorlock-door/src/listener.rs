//! Consumer loop for door commands on `device/command`.

use crate::controller::DoorController;
use crate::state::DoorTrigger;
use doorlock_bus::{BusError, MessageBus};
use doorlock_core::constants::TOPIC_DEVICE_COMMAND;
use doorlock_protocol::DeviceCommand;
use tracing::{info, trace, warn};

/// Opens the door on `unlock` and `toggle`.
///
/// Fingerprint commands share the topic and are ignored here.
pub struct DoorCommandListener<B> {
    controller: DoorController<B>,
    topic: String,
}

impl<B: MessageBus> DoorCommandListener<B> {
    pub fn new(controller: DoorController<B>) -> Self {
        Self {
            controller,
            topic: TOPIC_DEVICE_COMMAND.to_string(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Subscribe, announce the initial state and process commands until the
    /// bus goes away.
    pub async fn run(self) -> Result<(), BusError> {
        let mut commands = self.controller.bus().subscribe(&self.topic).await?;
        info!(topic = %self.topic, "Door command listener started");
        self.controller.start().await;

        while let Some(message) = commands.recv().await {
            self.handle(&message.payload).await;
        }

        info!("Door command listener stopped");
        Ok(())
    }

    /// Process one command payload.
    pub async fn handle(&self, payload: &str) {
        match payload.parse::<DeviceCommand>() {
            Ok(command) => match DoorTrigger::from_command(&command) {
                Some(trigger) => {
                    self.controller.trigger(trigger).await;
                }
                None => trace!(%command, "Not a door command"),
            },
            Err(e) => warn!(payload, "Ignoring command: {}", e),
        }
    }
}
