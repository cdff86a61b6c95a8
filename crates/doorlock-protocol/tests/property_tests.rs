//! Property-based tests for the sensor decoder and command codec.
//!
//! The decoder must be total: whatever the sensor (or a corrupted transport)
//! sends, it yields a variant and never panics.

use doorlock_core::FingerprintId;
use doorlock_protocol::{DeviceCommand, SensorEvent, decode};
use proptest::prelude::*;

/// Lines that cannot collide with the known vocabulary: every phrase has an
/// uppercase letter except `already in use`, which needs a `y`.
fn unknown_line() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-x ]{0,60}").expect("Failed to create unknown line strategy")
}

fn position() -> impl Strategy<Value = u32> {
    1u32..=3000u32
}

proptest! {
    /// Property: decoding arbitrary text never panics.
    #[test]
    fn prop_decode_is_total(raw in any::<String>()) {
        let _ = decode(&raw);
    }

    /// Property: text outside the vocabulary is always Unrecognized.
    #[test]
    fn prop_unknown_text_is_unrecognized(raw in unknown_line()) {
        prop_assert_eq!(decode(&raw), SensorEvent::Unrecognized(raw.trim().to_string()));
    }

    /// Property: decoding is a pure function of the input.
    #[test]
    fn prop_decode_is_deterministic(raw in any::<String>()) {
        prop_assert_eq!(decode(&raw), decode(&raw));
    }

    /// Property: any match line yields the reported position.
    #[test]
    fn prop_match_line_extracts_position(id in position()) {
        let event = decode(&format!("Fingerprint ID: #{id}"));
        prop_assert_eq!(
            event,
            SensorEvent::Match { matched: true, id: Some(FingerprintId::new(id)) }
        );
    }

    /// Property: a list line yields exactly the listed positions.
    #[test]
    fn prop_list_line_extracts_positions(ids in prop::collection::btree_set(position(), 1..20)) {
        let joined = ids.iter().map(u32::to_string).collect::<Vec<_>>().join(", ");
        let expected = ids.iter().copied().map(FingerprintId::new).collect();
        prop_assert_eq!(decode(&format!("Enrolled IDs: {joined}")), SensorEvent::List(expected));
    }

    /// Property: enroll and delete commands parse back to themselves.
    #[test]
    fn prop_positional_commands_parse_back(id in position(), delete in any::<bool>()) {
        let command = if delete {
            DeviceCommand::Delete(FingerprintId::new(id))
        } else {
            DeviceCommand::Enroll(FingerprintId::new(id))
        };
        prop_assert_eq!(command.to_string().parse::<DeviceCommand>().unwrap(), command);
    }
}
