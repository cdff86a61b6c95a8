//! Multi-factor access decisions.
//!
//! Credential producers (keypad, fingerprint sensor, face pipeline) each
//! send [`CredentialInput`](doorlock_core::CredentialInput)s into one
//! channel. The [`AccessCoordinator`] consumes that channel:
//!
//! ```text
//! inputs ──► SessionAggregator ──ready──► DecisionSubmitter ──► admission endpoint
//!                  ▲                            │
//!                  └────────── reset ◄──────────┘
//!                                               │ granted
//!                                               ▼
//!                                     "unlock" on device/command
//! ```
//!
//! The required factor count comes from a [`SettingsStore`]; the verdict from
//! an [`AdmissionClient`]. Both have HTTP implementations and in-process
//! ones for tests.

pub mod coordinator;
pub mod error;
pub mod keypad;
pub mod session;
pub mod settings;
pub mod submitter;

pub use coordinator::AccessCoordinator;
pub use error::AdmissionError;
pub use keypad::KeypadListener;
pub use session::{
    AggregatorConfig, ResetReason, Session, SessionAggregator, SessionSnapshot, SessionState,
    SessionStats,
};
pub use settings::{FixedSettings, HttpSettingsStore, SettingsStore};
pub use submitter::{
    AdmissionBundle, AdmissionClient, DecisionSubmitter, FaceBundle, FingerprintBundle,
    HttpAdmissionClient, SubmitOutcome, SubmitterConfig, Verdict, http_client,
};
