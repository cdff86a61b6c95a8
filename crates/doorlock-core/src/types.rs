use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template position on the fingerprint sensor.
///
/// The sensor addresses stored templates by a small positive integer. The
/// value is carried as reported; range policy belongs to the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintId(u32);

impl FingerprintId {
    /// Create a fingerprint id from its raw position.
    #[must_use]
    pub const fn new(position: u32) -> Self {
        Self(position)
    }

    /// Get the raw position.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for FingerprintId {
    fn from(position: u32) -> Self {
        Self(position)
    }
}

impl std::str::FromStr for FingerprintId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        digits
            .parse::<u32>()
            .map(FingerprintId)
            .map_err(|_| Error::InvalidFingerprintId(s.to_string()))
    }
}

/// Keypad PIN entered by a user.
///
/// `Debug` and `Display` mask the digits so a PIN never ends up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    /// Create a PIN from the entered symbols.
    ///
    /// # Errors
    /// Returns `Error::InvalidCredential` if the PIN is empty.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidCredential("PIN must not be empty".to_string()));
        }
        Ok(Pin(value))
    }

    /// Get the raw PIN.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of symbols in the PIN.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed PIN; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pin({})", "*".repeat(self.0.len()))
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", "*".repeat(self.0.len()))
    }
}

/// Result reported by the face-recognition pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceResult {
    pub matched: bool,
    pub label: String,
}

impl FaceResult {
    /// A positive match for `label`.
    pub fn matched(label: impl Into<String>) -> Self {
        Self {
            matched: true,
            label: label.into(),
        }
    }

    /// A face was seen but not recognized.
    pub fn unmatched() -> Self {
        Self {
            matched: false,
            label: String::new(),
        }
    }
}

/// Result reported by the fingerprint sensor for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintResult {
    pub matched: bool,
    pub id: Option<FingerprintId>,
}

impl FingerprintResult {
    /// A positive match against the template stored at `id`.
    pub fn matched(id: FingerprintId) -> Self {
        Self {
            matched: true,
            id: Some(id),
        }
    }

    /// The scan did not match any stored template.
    pub fn unmatched() -> Self {
        Self {
            matched: false,
            id: None,
        }
    }
}

/// Credential factor kinds a session collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Pin,
    Face,
    Fingerprint,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CredentialKind::Pin => write!(f, "pin"),
            CredentialKind::Face => write!(f, "face"),
            CredentialKind::Fingerprint => write!(f, "fingerprint"),
        }
    }
}

/// One partial credential produced by a sensor pipeline.
///
/// Every producer (keypad, face pipeline, fingerprint sensor) sends its
/// results to the session aggregator as one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialInput {
    Pin(Pin),
    Face(FaceResult),
    Fingerprint(FingerprintResult),
}

impl CredentialInput {
    /// The factor this input fills.
    #[must_use]
    pub fn kind(&self) -> CredentialKind {
        match self {
            CredentialInput::Pin(_) => CredentialKind::Pin,
            CredentialInput::Face(_) => CredentialKind::Face,
            CredentialInput::Fingerprint(_) => CredentialKind::Fingerprint,
        }
    }
}
