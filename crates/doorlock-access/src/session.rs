//! Credential session aggregation.
//!
//! One access attempt at a time is collected in a single shared session.
//! Producers fill their own factor; nobody clears another producer's factor.
//!
//! # States
//!
//! - `Empty`: nothing collected
//! - `Collecting`: at least one input, inactivity timer running
//! - `Ready`: threshold reached, waiting for the decision to be submitted
//!
//! # Transitions
//!
//! - Empty → Collecting on the first input
//! - Collecting → Ready when the score first reaches the threshold
//! - Collecting → Empty on inactivity timeout
//! - Ready → Empty when the decision has been submitted
//! - any → Empty on explicit reset
//!
//! # Scoring
//!
//! A non-empty PIN, a matched face and a matched fingerprint count one point
//! each. A reported non-match is stored but scores nothing.
//!
//! # Examples
//!
//! ```
//! use doorlock_access::{FixedSettings, ResetReason, SessionAggregator, SessionState};
//! use doorlock_core::{CredentialInput, FaceResult, Pin};
//!
//! # async fn example() {
//! let aggregator = SessionAggregator::new(FixedSettings::new(2));
//!
//! let pin = CredentialInput::Pin(Pin::new("1234").unwrap());
//! assert!(aggregator.update(pin).await.is_none());
//!
//! let face = CredentialInput::Face(FaceResult::matched("alice"));
//! let snapshot = aggregator.update(face).await.unwrap();
//! assert_eq!(snapshot.score, 2);
//! assert_eq!(aggregator.state().await, SessionState::Ready);
//!
//! aggregator.reset(ResetReason::Submitted).await;
//! assert_eq!(aggregator.state().await, SessionState::Empty);
//! # }
//! ```

use crate::settings::SettingsStore;
use doorlock_core::constants::DEFAULT_SESSION_TIMEOUT_SECS;
use doorlock_core::{CredentialInput, FaceResult, FingerprintResult, Pin};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Factors collected so far for the current access attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub pin: Option<Pin>,
    pub face: Option<FaceResult>,
    pub fingerprint: Option<FingerprintResult>,
}

impl Session {
    /// Store `input` in its own factor, leaving the others untouched.
    pub fn apply(&mut self, input: CredentialInput) {
        match input {
            CredentialInput::Pin(pin) => self.pin = Some(pin),
            CredentialInput::Face(face) => self.face = Some(face),
            CredentialInput::Fingerprint(fingerprint) => self.fingerprint = Some(fingerprint),
        }
    }

    /// Number of satisfied factors.
    #[must_use]
    pub fn score(&self) -> u8 {
        let pin = self.pin.as_ref().is_some_and(|pin| !pin.is_empty());
        let face = self.face.as_ref().is_some_and(|face| face.matched);
        let fingerprint = self.fingerprint.is_some_and(|fingerprint| fingerprint.matched);
        u8::from(pin) + u8::from(face) + u8::from(fingerprint)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pin.is_none() && self.face.is_none() && self.fingerprint.is_none()
    }
}

/// A session frozen at the moment it became ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: Session,
    pub score: u8,
    pub threshold: u8,
    /// Session generation the snapshot was taken from.
    pub(crate) generation: u64,
}

/// Lifecycle state of the shared session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Empty,
    Collecting,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Empty => write!(f, "empty"),
            SessionState::Collecting => write!(f, "collecting"),
            SessionState::Ready => write!(f, "ready"),
        }
    }
}

/// Why a session was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetReason {
    /// A decision was requested for it.
    Submitted,
    /// No input for the inactivity timeout.
    Timeout,
    /// Cleared on request.
    Explicit,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::Submitted => write!(f, "submitted"),
            ResetReason::Timeout => write!(f, "inactivity timeout"),
            ResetReason::Explicit => write!(f, "explicit reset"),
        }
    }
}

/// Counters since the aggregator was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Sessions that reached the threshold.
    pub decisions: u64,
    /// Resets caused by inactivity.
    pub timeouts: u64,
    /// All resets, whatever the reason.
    pub resets: u64,
}

/// Aggregator tuning.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    /// Idle time after the latest input before the session is dropped.
    pub inactivity_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
struct Inner {
    session: Session,
    state: SessionState,
    /// Bumped on every input and reset; a timer only fires for its own.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    stats: SessionStats,
}

impl Inner {
    fn new() -> Self {
        Self {
            session: Session::default(),
            state: SessionState::Empty,
            generation: 0,
            timer: None,
            stats: SessionStats::default(),
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn reset(&mut self, reason: ResetReason) {
        self.cancel_timer();
        let previous = self.state;
        self.session = Session::default();
        self.state = SessionState::Empty;
        self.generation += 1;
        self.stats.resets += 1;
        if reason == ResetReason::Timeout {
            self.stats.timeouts += 1;
        }
        info!(%previous, %reason, "Session cleared");
    }

    fn snapshot(&self, threshold: u8) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            score: self.session.score(),
            threshold,
            generation: self.generation,
        }
    }
}

/// Shared handle to the single live session.
///
/// All reads and writes, including the readiness check, happen under one
/// lock. The settings lookup happens before the lock is taken.
pub struct SessionAggregator<S> {
    settings: Arc<S>,
    config: AggregatorConfig,
    inner: Arc<Mutex<Inner>>,
}

impl<S> Clone for SessionAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            config: self.config,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SettingsStore> SessionAggregator<S> {
    pub fn new(settings: S) -> Self {
        Self::with_config(settings, AggregatorConfig::default())
    }

    pub fn with_config(settings: S, config: AggregatorConfig) -> Self {
        Self {
            settings: Arc::new(settings),
            config,
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    /// Add one input to the session.
    ///
    /// Restarts the inactivity timer. Returns the snapshot exactly once, on
    /// the update that first reaches the threshold; the session then stays
    /// `Ready`, ignoring further inputs, until it is reset.
    pub async fn update(&self, input: CredentialInput) -> Option<SessionSnapshot> {
        let threshold = self.settings.required_factor_count().await;
        let kind = input.kind();

        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Ready {
            debug!(%kind, "Decision pending, input ignored");
            return None;
        }

        inner.session.apply(input);
        inner.state = SessionState::Collecting;
        inner.generation += 1;
        self.restart_timer(&mut inner);

        let score = inner.session.score();
        info!(%kind, score, threshold, "Session updated");

        if score < threshold {
            return None;
        }

        inner.cancel_timer();
        inner.state = SessionState::Ready;
        inner.stats.decisions += 1;
        info!(score, threshold, "Session ready for decision");
        Some(inner.snapshot(threshold))
    }

    /// Clear the session.
    pub async fn reset(&self, reason: ResetReason) {
        self.inner.lock().await.reset(reason);
    }

    /// Clear the session only while it is still the ready session that
    /// produced `snapshot`. Returns `false` if it was already replaced.
    pub async fn reset_if_current(&self, snapshot: &SessionSnapshot, reason: ResetReason) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != snapshot.generation || inner.state != SessionState::Ready {
            debug!(%reason, state = %inner.state, "Session replaced since snapshot, left untouched");
            return false;
        }
        inner.reset(reason);
        true
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Copy of the factors collected so far.
    pub async fn session(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    pub async fn stats(&self) -> SessionStats {
        self.inner.lock().await.stats
    }

    fn restart_timer(&self, inner: &mut Inner) {
        inner.cancel_timer();

        let generation = inner.generation;
        let timeout = self.config.inactivity_timeout;
        let shared = Arc::clone(&self.inner);

        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let mut inner = shared.lock().await;
            if inner.generation == generation && inner.state == SessionState::Collecting {
                inner.timer = None;
                inner.reset(ResetReason::Timeout);
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedSettings;
    use doorlock_core::FingerprintId;
    use rstest::rstest;

    fn pin(value: &str) -> CredentialInput {
        CredentialInput::Pin(Pin::new(value).unwrap())
    }

    #[rstest]
    #[case(Session::default(), 0)]
    #[case(Session { pin: Some(Pin::new("1").unwrap()), ..Session::default() }, 1)]
    #[case(Session { face: Some(FaceResult::unmatched()), ..Session::default() }, 0)]
    #[case(Session { face: Some(FaceResult::matched("bob")), ..Session::default() }, 1)]
    #[case(Session { fingerprint: Some(FingerprintResult::unmatched()), ..Session::default() }, 0)]
    #[case(
        Session {
            pin: Some(Pin::new("1234").unwrap()),
            face: Some(FaceResult::matched("alice")),
            fingerprint: Some(FingerprintResult::matched(FingerprintId::new(3))),
        },
        3
    )]
    fn test_score(#[case] session: Session, #[case] expected: u8) {
        assert_eq!(session.score(), expected);
    }

    #[test]
    fn test_apply_keeps_other_factors() {
        let mut session = Session::default();
        session.apply(pin("1234"));
        session.apply(CredentialInput::Face(FaceResult::matched("alice")));
        session.apply(pin("9999"));

        assert_eq!(session.pin.as_ref().map(Pin::as_str), Some("9999"));
        assert_eq!(session.face, Some(FaceResult::matched("alice")));
        assert!(session.fingerprint.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_input_starts_collecting() {
        let aggregator = SessionAggregator::new(FixedSettings::new(2));
        assert_eq!(aggregator.state().await, SessionState::Empty);

        assert!(aggregator.update(pin("1234")).await.is_none());
        assert_eq!(aggregator.state().await, SessionState::Collecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_factors_never_reach_threshold() {
        let aggregator = SessionAggregator::new(FixedSettings::new(1));

        assert!(
            aggregator
                .update(CredentialInput::Face(FaceResult::unmatched()))
                .await
                .is_none()
        );
        assert!(
            aggregator
                .update(CredentialInput::Fingerprint(FingerprintResult::unmatched()))
                .await
                .is_none()
        );
        assert_eq!(aggregator.state().await, SessionState::Collecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_if_current_spares_newer_session() {
        let aggregator = SessionAggregator::new(FixedSettings::new(1));
        let snapshot = aggregator.update(pin("1234")).await.unwrap();

        aggregator.reset(ResetReason::Explicit).await;
        aggregator.update(CredentialInput::Face(FaceResult::unmatched())).await;

        assert!(!aggregator.reset_if_current(&snapshot, ResetReason::Submitted).await);
        assert_eq!(aggregator.state().await, SessionState::Collecting);
        assert!(aggregator.session().await.face.is_some());

        let snapshot = aggregator.update(pin("5678")).await.unwrap();
        assert!(aggregator.reset_if_current(&snapshot, ResetReason::Submitted).await);
        assert_eq!(aggregator.state().await, SessionState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_reset_counts() {
        let aggregator = SessionAggregator::new(FixedSettings::new(2));
        aggregator.update(pin("1234")).await;

        aggregator.reset(ResetReason::Explicit).await;

        assert_eq!(aggregator.state().await, SessionState::Empty);
        assert!(aggregator.session().await.is_empty());
        assert_eq!(
            aggregator.stats().await,
            SessionStats {
                decisions: 0,
                timeouts: 0,
                resets: 1
            }
        );
    }
}
