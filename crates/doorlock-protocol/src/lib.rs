//! Wire vocabulary of the door lock devices.
//!
//! - [`decoder`]: turns free-text fingerprint sensor lines into [`SensorEvent`]s
//! - [`command`]: the `device/command` payloads ([`DeviceCommand`])
//! - [`keypad`]: key-id mapping and PIN buffering

pub mod command;
pub mod decoder;
pub mod keypad;

pub use command::DeviceCommand;
pub use decoder::{EnrollEvent, EnrollPhase, SensorEvent, SensorStatus, decode};
pub use keypad::{KeypadKey, PinBuffer, PinEntry};
