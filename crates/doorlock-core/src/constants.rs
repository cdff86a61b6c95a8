//! Core constants for the door lock coordination layer.
//!
//! This module collects the bus topic names, timing defaults and limits that
//! are shared by every crate in the workspace. Values mirror what the deployed
//! sensor firmware and admission backend expect; the daemon configuration can
//! override the timing values but topic names are part of the device contract.
//!
//! # Usage
//!
//! ```
//! use doorlock_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(TOPIC_DEVICE_COMMAND, "device/command");
//!
//! let timeout = Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS);
//! assert_eq!(timeout.as_secs(), 200);
//! ```

// ============================================================================
// Bus Topics
// ============================================================================

/// Commands sent to device processes (fingerprint sensor and lock relay).
pub const TOPIC_DEVICE_COMMAND: &str = "device/command";

/// Free-text status and result lines emitted by the fingerprint sensor.
pub const TOPIC_FINGERPRINT_EVENTS: &str = "device/fingerprint-events";

/// Key-id strings emitted by the keypad.
pub const TOPIC_KEYPAD: &str = "device/keypad";

/// Doorbell button notifications.
pub const TOPIC_BELL: &str = "device/bell";

/// Current door state (`Locked` / `Unlocked`).
pub const TOPIC_DOOR_STATUS: &str = "status/door";

/// Human-readable timestamped log lines.
pub const TOPIC_LOGS: &str = "status/logs";

/// Payload published by the doorbell process.
pub const BELL_PRESSED: &str = "Bell pressed";

// ============================================================================
// Session Defaults
// ============================================================================

/// Inactivity window after which a partial session is discarded (seconds).
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 200;

/// Number of satisfied factors required when the settings store is unreachable.
pub const DEFAULT_REQUIRED_FACTORS: u8 = 2;

/// Number of credential factors a session can carry (pin, face, fingerprint).
pub const MAX_FACTORS: u8 = 3;

/// Length of a complete keypad PIN.
pub const DEFAULT_PIN_LENGTH: usize = 4;

// ============================================================================
// Fingerprint Sensor
// ============================================================================

/// Maximum wait for an enrollment to finish (seconds).
pub const DEFAULT_ENROLL_TIMEOUT_SECS: u64 = 30;

/// Maximum wait for a list response (seconds).
pub const DEFAULT_LIST_TIMEOUT_SECS: u64 = 15;

/// Minimum gap between two accepted responses of the same command family.
///
/// The sensor repeats status lines in quick succession; anything closer than
/// this to the previously accepted response is treated as a duplicate.
pub const DEFAULT_RESPONSE_COOLDOWN_MS: u64 = 500;

/// Highest template position the sensor accepts.
///
/// The firmware rejects enrollments outside `1..=127` with
/// `Invalid ID: Must be between 1 and 127`.
pub const DEFAULT_MAX_FINGERPRINT_POSITION: u32 = 127;

// ============================================================================
// Admission Endpoint
// ============================================================================

/// Total attempts made against the admission endpoint per decision.
pub const DEFAULT_SUBMIT_ATTEMPTS: u32 = 3;

/// Delay between two admission attempts (milliseconds).
pub const DEFAULT_SUBMIT_RETRY_DELAY_MS: u64 = 1000;

/// Per-request HTTP timeout (seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Door Actuation
// ============================================================================

/// Time an unlocked door stays open before relocking (seconds).
pub const DEFAULT_RELOCK_AFTER_SECS: u64 = 5;

/// Window in which repeated button edges are ignored (milliseconds).
pub const DEFAULT_BUTTON_DEBOUNCE_MS: u64 = 200;

/// Minimum gap between two doorbell notifications (milliseconds).
pub const DEFAULT_BELL_COOLDOWN_MS: u64 = 1000;

// ============================================================================
// Transport
// ============================================================================

/// Fixed delay between bus reconnect attempts (milliseconds).
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 2000;

/// Number of operator log lines kept in memory.
pub const RECENT_LOG_CAPACITY: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_are_distinct() {
        let topics = [
            TOPIC_DEVICE_COMMAND,
            TOPIC_FINGERPRINT_EVENTS,
            TOPIC_KEYPAD,
            TOPIC_BELL,
            TOPIC_DOOR_STATUS,
            TOPIC_LOGS,
        ];

        for (i, a) in topics.iter().enumerate() {
            for b in &topics[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_required_factors_within_bounds() {
        assert!(DEFAULT_REQUIRED_FACTORS >= 1);
        assert!(DEFAULT_REQUIRED_FACTORS <= MAX_FACTORS);
    }
}
