//! Keypad key-id mapping and PIN buffering.
//!
//! The keypad process publishes the numeric id of each pressed key on
//! `device/keypad`. Ids `1`-`9` are the digits, `10` is `*`, `11` is `0` and
//! `12` is `#`, following the 4x3 matrix layout:
//!
//! ```text
//!  1  2  3
//!  4  5  6
//!  7  8  9
//! 10 11 12   ->   *  0  #
//! ```

use doorlock_core::constants::DEFAULT_PIN_LENGTH;
use doorlock_core::{Error, Pin, Result};

/// A key on the 4x3 keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadKey {
    Digit(u8),
    Star,
    Hash,
}

impl KeypadKey {
    /// Map a key id published by the keypad process.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownKey` for ids outside `1..=12`.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorlock_protocol::KeypadKey;
    ///
    /// assert_eq!(KeypadKey::from_key_id("11").unwrap(), KeypadKey::Digit(0));
    /// assert_eq!(KeypadKey::from_key_id("10").unwrap(), KeypadKey::Star);
    /// assert!(KeypadKey::from_key_id("13").is_err());
    /// ```
    pub fn from_key_id(key_id: &str) -> Result<Self> {
        let key_id = key_id.trim();
        match key_id {
            "10" => Ok(KeypadKey::Star),
            "11" => Ok(KeypadKey::Digit(0)),
            "12" => Ok(KeypadKey::Hash),
            _ => match key_id.parse::<u8>() {
                Ok(d @ 1..=9) if key_id.len() == 1 => Ok(KeypadKey::Digit(d)),
                _ => Err(Error::UnknownKey(key_id.to_string())),
            },
        }
    }

    /// Symbol printed on the key.
    #[must_use]
    pub fn symbol(&self) -> char {
        match self {
            KeypadKey::Digit(d) => char::from(b'0' + d),
            KeypadKey::Star => '*',
            KeypadKey::Hash => '#',
        }
    }
}

/// Outcome of feeding one key id into a [`PinBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinEntry {
    /// Key accepted; `entered` symbols buffered so far.
    Pending { entered: usize },
    /// The PIN reached its full length; the buffer is empty again.
    Complete(Pin),
    /// Unknown key id; the buffer was cleared.
    Rejected,
}

/// Accumulates key presses until a full PIN has been typed.
#[derive(Debug, Clone)]
pub struct PinBuffer {
    symbols: String,
    length: usize,
}

impl PinBuffer {
    /// Buffer producing PINs of `length` symbols.
    pub fn new(length: usize) -> Self {
        Self {
            symbols: String::with_capacity(length),
            length: length.max(1),
        }
    }

    /// Feed one raw key id.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorlock_protocol::{PinBuffer, PinEntry};
    ///
    /// let mut buffer = PinBuffer::default();
    /// for key in ["1", "2", "3"] {
    ///     assert!(matches!(buffer.push_key_id(key), PinEntry::Pending { .. }));
    /// }
    /// match buffer.push_key_id("4") {
    ///     PinEntry::Complete(pin) => assert_eq!(pin.as_str(), "1234"),
    ///     other => panic!("unexpected {other:?}"),
    /// }
    /// ```
    pub fn push_key_id(&mut self, key_id: &str) -> PinEntry {
        match KeypadKey::from_key_id(key_id) {
            Ok(key) => self.push(key),
            Err(_) => {
                self.clear();
                PinEntry::Rejected
            }
        }
    }

    /// Feed one mapped key.
    pub fn push(&mut self, key: KeypadKey) -> PinEntry {
        self.symbols.push(key.symbol());
        if self.symbols.len() < self.length {
            return PinEntry::Pending {
                entered: self.symbols.len(),
            };
        }

        let symbols = std::mem::take(&mut self.symbols);
        match Pin::new(symbols) {
            Ok(pin) => PinEntry::Complete(pin),
            Err(_) => PinEntry::Rejected,
        }
    }

    /// Drop everything typed so far.
    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    /// Number of buffered symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Default for PinBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_PIN_LENGTH)
    }
}
