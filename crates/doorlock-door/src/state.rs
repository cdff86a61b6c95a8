//! Door states and triggers.

use doorlock_protocol::DeviceCommand;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the lock relay.
///
/// `Display` gives the exact payload published on `status/door`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorState {
    Locked,
    Unlocked,
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorState::Locked => write!(f, "Locked"),
            DoorState::Unlocked => write!(f, "Unlocked"),
        }
    }
}

/// Something that opens the door.
///
/// `Toggle` never locks an open door: like `Unlock`, it only restarts the
/// relock timer when the door is already unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorTrigger {
    Unlock,
    Toggle,
}

impl DoorTrigger {
    /// The trigger carried by a device command, if any.
    pub fn from_command(command: &DeviceCommand) -> Option<Self> {
        match command {
            DeviceCommand::Unlock => Some(DoorTrigger::Unlock),
            DeviceCommand::Toggle => Some(DoorTrigger::Toggle),
            _ => None,
        }
    }
}

impl fmt::Display for DoorTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorTrigger::Unlock => write!(f, "unlock"),
            DoorTrigger::Toggle => write!(f, "toggle"),
        }
    }
}
