//! Payloads carried on the `device/command` topic.
//!
//! The fingerprint sensor and the lock relay share one command topic. Each
//! payload is a short ASCII token:
//!
//! | Command | Payload |
//! |---|---|
//! | Enroll at position | `enroll/<id>` |
//! | Delete position | `delete/<id>` |
//! | Delete every template | `delete/all` |
//! | List positions | `list` |
//! | Unlock the door | `unlock` |
//! | Toggle the door | `toggle` |
//!
//! # Examples
//!
//! ```
//! use doorlock_core::FingerprintId;
//! use doorlock_protocol::DeviceCommand;
//!
//! let command = DeviceCommand::Enroll(FingerprintId::new(3));
//! assert_eq!(command.to_string(), "enroll/3");
//!
//! let parsed: DeviceCommand = "delete/all".parse().unwrap();
//! assert_eq!(parsed, DeviceCommand::DeleteAll);
//! ```

use doorlock_core::{Error, FingerprintId, Result};
use std::fmt;
use std::str::FromStr;

/// A command addressed to a device process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCommand {
    Enroll(FingerprintId),
    Delete(FingerprintId),
    DeleteAll,
    List,
    Unlock,
    Toggle,
}

impl DeviceCommand {
    /// `true` for commands consumed by the door actuator.
    #[must_use]
    pub fn is_door_trigger(&self) -> bool {
        matches!(self, DeviceCommand::Unlock | DeviceCommand::Toggle)
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCommand::Enroll(id) => write!(f, "enroll/{}", id.as_u32()),
            DeviceCommand::Delete(id) => write!(f, "delete/{}", id.as_u32()),
            DeviceCommand::DeleteAll => write!(f, "delete/all"),
            DeviceCommand::List => write!(f, "list"),
            DeviceCommand::Unlock => write!(f, "unlock"),
            DeviceCommand::Toggle => write!(f, "toggle"),
        }
    }
}

impl FromStr for DeviceCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let payload = s.trim();
        let invalid = || Error::InvalidCommand(payload.to_string());

        match payload {
            "list" => return Ok(DeviceCommand::List),
            "unlock" => return Ok(DeviceCommand::Unlock),
            "toggle" => return Ok(DeviceCommand::Toggle),
            "delete/all" => return Ok(DeviceCommand::DeleteAll),
            _ => {}
        }

        let (verb, argument) = payload.split_once('/').ok_or_else(invalid)?;
        let id = argument
            .parse::<u32>()
            .map(FingerprintId::new)
            .map_err(|_| invalid())?;

        match verb {
            "enroll" => Ok(DeviceCommand::Enroll(id)),
            "delete" => Ok(DeviceCommand::Delete(id)),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DeviceCommand::Enroll(FingerprintId::new(12)), "enroll/12")]
    #[case(DeviceCommand::Delete(FingerprintId::new(1)), "delete/1")]
    #[case(DeviceCommand::DeleteAll, "delete/all")]
    #[case(DeviceCommand::List, "list")]
    #[case(DeviceCommand::Unlock, "unlock")]
    #[case(DeviceCommand::Toggle, "toggle")]
    fn test_encode_and_parse(#[case] command: DeviceCommand, #[case] payload: &str) {
        assert_eq!(command.to_string(), payload);
        assert_eq!(payload.parse::<DeviceCommand>().unwrap(), command);
    }

    #[rstest]
    #[case("")]
    #[case("open")]
    #[case("enroll/")]
    #[case("enroll/abc")]
    #[case("format/3")]
    #[case("delete/-1")]
    fn test_parse_invalid(#[case] payload: &str) {
        assert!(matches!(
            payload.parse::<DeviceCommand>(),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_door_triggers() {
        assert!(DeviceCommand::Unlock.is_door_trigger());
        assert!(DeviceCommand::Toggle.is_door_trigger());
        assert!(!DeviceCommand::List.is_door_trigger());
    }
}
