//! Command/response correlation for the fingerprint sensor.
//!
//! The sensor has no request ids: a `list` command is answered by whatever
//! `Enrolled IDs: ...` line shows up next. Correlation therefore relies on
//! one pending slot per command family:
//!
//! 1. A new request clears its family's slot and cooldown and takes a new
//!    request generation. An older wait in that family is woken and ends
//!    with `CorrelatorError::Superseded`; only the newest wait is answered.
//! 2. The command is published.
//! 3. The listener delivers decoded events; the first terminal response
//!    outside the cooldown window fills the slot and wakes the waiter.
//! 4. The waiter takes the response, or gives up at its deadline.
//!
//! Sensors often repeat a line, so a response arriving within the cooldown
//! of the previously accepted one in the same family is discarded.
//!
//! Transport reconnects do not cancel a pending wait. It simply runs to its
//! own deadline.

use doorlock_bus::{BusError, MessageBus};
use doorlock_core::FingerprintId;
use doorlock_core::constants::{
    DEFAULT_ENROLL_TIMEOUT_SECS, DEFAULT_LIST_TIMEOUT_SECS, DEFAULT_RESPONSE_COOLDOWN_MS,
    TOPIC_DEVICE_COMMAND,
};
use doorlock_protocol::{DeviceCommand, EnrollEvent, EnrollPhase, SensorEvent};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Result type alias for correlated commands.
pub type Result<T> = std::result::Result<T, CorrelatorError>;

/// A request/response command family. Each has its own slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFamily {
    Enroll,
    List,
}

impl fmt::Display for CommandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFamily::Enroll => write!(f, "enroll"),
            CommandFamily::List => write!(f, "list"),
        }
    }
}

/// Errors returned by correlated commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelatorError {
    /// No accepted response before the deadline.
    #[error("No {family} response within {timeout:?}")]
    Timeout {
        family: CommandFamily,
        timeout: Duration,
    },

    /// The sensor reported that enrollment failed.
    #[error("Enrollment of {id} failed: {reason}")]
    EnrollFailed { id: FingerprintId, reason: String },

    /// A newer request of the same family took over the slot.
    #[error("{family} wait superseded by a newer request")]
    Superseded { family: CommandFamily },

    /// The command could not be published.
    #[error("Command not sent: {0}")]
    Bus(#[from] BusError),
}

impl CorrelatorError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CorrelatorError::Timeout { .. })
    }
}

/// Deadlines and dedup window for correlated commands.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    pub enroll_timeout: Duration,
    pub list_timeout: Duration,
    /// Minimum spacing between two accepted responses of one family.
    pub cooldown: Duration,
    pub command_topic: String,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            enroll_timeout: Duration::from_secs(DEFAULT_ENROLL_TIMEOUT_SECS),
            list_timeout: Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS),
            cooldown: Duration::from_millis(DEFAULT_RESPONSE_COOLDOWN_MS),
            command_topic: TOPIC_DEVICE_COMMAND.to_string(),
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    response: Option<T>,
    last_accepted: Option<Instant>,
    /// Bumped by every request; a wait only takes responses for its own.
    generation: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            response: None,
            last_accepted: None,
            generation: 0,
        }
    }
}

impl<T> Slot<T> {
    /// Clear the slot for a new request and return its generation.
    fn begin(&mut self) -> u64 {
        self.response = None;
        self.last_accepted = None;
        self.generation += 1;
        self.generation
    }

    fn take(&mut self, generation: u64) -> Option<Option<T>> {
        (self.generation == generation).then(|| self.response.take())
    }

    /// Store `response` unless it falls inside the cooldown window.
    fn offer(&mut self, response: T, now: Instant, cooldown: Duration) -> bool {
        if within_cooldown(self.last_accepted, now, cooldown) {
            return false;
        }
        self.last_accepted = Some(now);
        self.response = Some(response);
        true
    }
}

fn within_cooldown(last: Option<Instant>, now: Instant, cooldown: Duration) -> bool {
    last.is_some_and(|last| now.saturating_duration_since(last) < cooldown)
}

#[derive(Debug, Default)]
struct Slots {
    enroll: Slot<EnrollEvent>,
    list: Slot<BTreeSet<FingerprintId>>,
    last_progress: Option<Instant>,
    /// Position of the most recent enroll request.
    enroll_context: Option<FingerprintId>,
}

#[derive(Debug, Default)]
struct Shared {
    slots: Mutex<Slots>,
    enroll_ready: Notify,
    list_ready: Notify,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Turns fire-and-forget sensor commands into awaited calls.
///
/// Cloning yields another handle to the same slots, so the listener task
/// that delivers events and the task that issues commands can each own one.
#[derive(Debug, Clone)]
pub struct CommandCorrelator<B> {
    bus: B,
    config: Arc<CorrelatorConfig>,
    shared: Arc<Shared>,
}

impl<B: MessageBus> CommandCorrelator<B> {
    pub fn new(bus: B, config: CorrelatorConfig) -> Self {
        Self {
            bus,
            config: Arc::new(config),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Enroll a template at `position` and wait for the outcome.
    ///
    /// Progress lines are logged but never end the wait.
    ///
    /// # Errors
    ///
    /// - `CorrelatorError::EnrollFailed` when the sensor reports a failure
    /// - `CorrelatorError::Timeout` when no terminal line arrives in time
    /// - `CorrelatorError::Superseded` when a newer enroll request took over
    /// - `CorrelatorError::Bus` when the command cannot be published
    pub async fn send_enroll(&self, position: FingerprintId) -> Result<FingerprintId> {
        let deadline = Instant::now() + self.config.enroll_timeout;
        let generation = {
            let mut slots = self.shared.slots();
            slots.enroll_context = Some(position);
            slots.enroll.begin()
        };
        self.shared.enroll_ready.notify_waiters();

        self.publish(DeviceCommand::Enroll(position)).await?;
        info!(%position, "Enroll command sent");

        let event = self
            .wait(
                CommandFamily::Enroll,
                generation,
                deadline,
                self.config.enroll_timeout,
                &self.shared.enroll_ready,
                |slots| &mut slots.enroll,
            )
            .await?;

        match event.phase {
            EnrollPhase::Success => {
                let id = event.id.unwrap_or(position);
                info!(%id, "Enrollment successful");
                Ok(id)
            }
            _ => {
                let reason = event.error.unwrap_or(event.message);
                warn!(%position, %reason, "Enrollment failed");
                Err(CorrelatorError::EnrollFailed {
                    id: event.id.unwrap_or(position),
                    reason,
                })
            }
        }
    }

    /// Ask the sensor for its enrolled positions.
    ///
    /// # Errors
    ///
    /// A missing answer is `CorrelatorError::Timeout`, never an empty set.
    /// A newer `send_list` ends this one with `CorrelatorError::Superseded`.
    pub async fn send_list(&self) -> Result<BTreeSet<FingerprintId>> {
        let deadline = Instant::now() + self.config.list_timeout;
        let generation = self.shared.slots().list.begin();
        self.shared.list_ready.notify_waiters();

        self.publish(DeviceCommand::List).await?;
        debug!("List command sent");

        let positions = self
            .wait(
                CommandFamily::List,
                generation,
                deadline,
                self.config.list_timeout,
                &self.shared.list_ready,
                |slots| &mut slots.list,
            )
            .await?;

        info!(count = positions.len(), "Received enrolled positions");
        Ok(positions)
    }

    /// Delete one template. The sensor's answer is only logged.
    pub async fn send_delete(&self, id: FingerprintId) -> Result<()> {
        self.publish(DeviceCommand::Delete(id)).await?;
        info!(%id, "Delete command sent");
        Ok(())
    }

    /// Delete every template. The sensor's answer is only logged.
    pub async fn send_delete_all(&self) -> Result<()> {
        self.publish(DeviceCommand::DeleteAll).await?;
        info!("Delete-all command sent");
        Ok(())
    }

    /// Offer a decoded event to the pending slots.
    ///
    /// Returns `true` if the event belongs to a correlated family, whether or
    /// not it was accepted. Other events are left to the caller.
    pub fn deliver(&self, event: &SensorEvent) -> bool {
        match event {
            SensorEvent::Enroll(enroll) => {
                self.deliver_enroll(enroll.clone());
                true
            }
            SensorEvent::List(positions) => {
                self.deliver_list(positions.clone());
                true
            }
            _ => false,
        }
    }

    fn deliver_enroll(&self, mut event: EnrollEvent) {
        let now = Instant::now();
        let cooldown = self.config.cooldown;
        let mut slots = self.shared.slots();

        if !event.phase.is_terminal() {
            if within_cooldown(slots.last_progress, now, cooldown) {
                debug!(message = %event.message, "Ignoring repeated enroll step");
            } else {
                slots.last_progress = Some(now);
                info!(message = %event.message, "Enroll step");
            }
            return;
        }

        if event.phase == EnrollPhase::Success && event.id.is_none() {
            event.id = slots.enroll_context;
        }

        let message = event.message.clone();
        if slots.enroll.offer(event, now, cooldown) {
            drop(slots);
            debug!(%message, "Enroll response accepted");
            self.shared.enroll_ready.notify_waiters();
        } else {
            debug!(%message, "Ignoring repeated enroll response");
        }
    }

    fn deliver_list(&self, positions: BTreeSet<FingerprintId>) {
        let now = Instant::now();
        let count = positions.len();
        let mut slots = self.shared.slots();

        if slots.list.offer(positions, now, self.config.cooldown) {
            drop(slots);
            debug!(count, "List response accepted");
            self.shared.list_ready.notify_waiters();
        } else {
            debug!(count, "Ignoring repeated list response");
        }
    }

    async fn publish(&self, command: DeviceCommand) -> Result<()> {
        self.bus
            .publish(&self.config.command_topic, &command.to_string())
            .await
            .map_err(|e| {
                warn!(%command, "Failed to send command: {}", e);
                CorrelatorError::from(e)
            })
    }

    async fn wait<T>(
        &self,
        family: CommandFamily,
        generation: u64,
        deadline: Instant,
        timeout: Duration,
        ready: &Notify,
        slot: fn(&mut Slots) -> &mut Slot<T>,
    ) -> Result<T> {
        loop {
            // Registered before checking the slot so a delivery in between
            // is not missed.
            let notified = ready.notified();

            let response = slot(&mut *self.shared.slots()).take(generation);
            match response {
                Some(Some(response)) => return Ok(response),
                Some(None) => {}
                None => {
                    debug!(%family, "Wait superseded by a newer request");
                    return Err(CorrelatorError::Superseded { family });
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                warn!(%family, ?timeout, "No response from sensor");
                return Err(CorrelatorError::Timeout { family, timeout });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorlock_bus::MemoryBus;
    use doorlock_protocol::decode;

    fn correlator() -> CommandCorrelator<MemoryBus> {
        CommandCorrelator::new(MemoryBus::new(), CorrelatorConfig::default())
    }

    #[test]
    fn test_cooldown_window() {
        let now = Instant::now();
        let cooldown = Duration::from_millis(500);

        assert!(!within_cooldown(None, now, cooldown));
        assert!(within_cooldown(Some(now), now, cooldown));
        assert!(!within_cooldown(
            Some(now),
            now + Duration::from_millis(500),
            cooldown
        ));
    }

    #[test]
    fn test_family_display() {
        assert_eq!(CommandFamily::Enroll.to_string(), "enroll");
        assert_eq!(CommandFamily::List.to_string(), "list");
    }

    #[test]
    fn test_enroll_failed_display() {
        let error = CorrelatorError::EnrollFailed {
            id: FingerprintId::new(4),
            reason: "ID in use".to_string(),
        };
        assert_eq!(error.to_string(), "Enrollment of #4 failed: ID in use");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_routes_only_correlated_families() {
        let correlator = correlator();

        assert!(correlator.deliver(&decode("Enrolled IDs: 1")));
        assert!(correlator.deliver(&decode("Scan 1 successful")));
        assert!(!correlator.deliver(&decode("Fingerprint ID: #1")));
        assert!(!correlator.deliver(&decode("Deleted ID 1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_without_id_takes_context() {
        let correlator = correlator();
        correlator.shared.slots().enroll_context = Some(FingerprintId::new(6));

        correlator.deliver(&decode("Enroll success"));

        let event = correlator.shared.slots().enroll.response.take().unwrap();
        assert_eq!(event.id, Some(FingerprintId::new(6)));
    }

    #[test]
    fn test_slot_take_checks_generation() {
        let mut slot = Slot::default();
        let first = slot.begin();
        slot.offer(5u8, Instant::now(), Duration::ZERO);
        let second = slot.begin();
        slot.offer(7u8, Instant::now(), Duration::ZERO);

        assert_eq!(slot.take(first), None);
        assert_eq!(slot.take(second), Some(Some(7)));
        assert_eq!(slot.take(second), Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_does_not_fill_slot() {
        let correlator = correlator();

        correlator.deliver(&decode("Place finger for first scan"));
        assert!(correlator.shared.slots().enroll.response.is_none());
        assert!(correlator.shared.slots().last_progress.is_some());
    }
}
