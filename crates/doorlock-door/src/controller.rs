//! Lock relay state machine.
//!
//! # Transitions
//!
//! - Locked → Unlocked on any trigger; the relock timer starts
//! - Unlocked → Unlocked on any trigger; the relock timer restarts
//! - Unlocked → Locked when the relock timer expires
//!
//! Only real transitions are announced on `status/door` and in the status
//! log. A restarted timer is silent.
//!
//! A transition and its announcement happen under one async lock, so the
//! last published status always matches the current state.

use crate::state::{DoorState, DoorTrigger};
use doorlock_bus::{EventLog, MessageBus};
use doorlock_core::constants::{DEFAULT_RELOCK_AFTER_SECS, TOPIC_DOOR_STATUS};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Door controller settings.
#[derive(Debug, Clone)]
pub struct DoorConfig {
    /// How long the door stays unlocked after the latest trigger.
    pub relock_after: Duration,
    pub status_topic: String,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            relock_after: Duration::from_secs(DEFAULT_RELOCK_AFTER_SECS),
            status_topic: TOPIC_DOOR_STATUS.to_string(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: DoorState,
    /// Bumped on every trigger so a superseded timer cannot relock.
    generation: u64,
    relock: Option<JoinHandle<()>>,
}

/// Shared handle to the door state machine.
#[derive(Debug)]
pub struct DoorController<B> {
    log: EventLog<B>,
    config: Arc<DoorConfig>,
    inner: Arc<Mutex<Inner>>,
    /// Held from a state change until it has been published.
    transition: Arc<AsyncMutex<()>>,
}

impl<B: Clone> Clone for DoorController<B> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            config: Arc::clone(&self.config),
            inner: Arc::clone(&self.inner),
            transition: Arc::clone(&self.transition),
        }
    }
}

impl<B: MessageBus> DoorController<B> {
    /// A controller for a door that starts out locked.
    pub fn new(log: EventLog<B>, config: DoorConfig) -> Self {
        Self {
            log,
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(Inner {
                state: DoorState::Locked,
                generation: 0,
                relock: None,
            })),
            transition: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Announce the initial `Locked` state.
    pub async fn start(&self) {
        info!(relock_after = ?self.config.relock_after, "Door controller started");
        let _transition = self.transition.lock().await;
        let state = self.state();
        self.publish_state(state).await;
    }

    pub fn state(&self) -> DoorState {
        self.lock().state
    }

    /// The bus status updates are published on.
    pub fn bus(&self) -> &B {
        self.log.bus()
    }

    /// Open the door, or keep it open for another full relock period.
    pub async fn trigger(&self, trigger: DoorTrigger) -> DoorState {
        let _transition = self.transition.lock().await;
        let opened = {
            let mut inner = self.lock();
            let opened = inner.state == DoorState::Locked;
            inner.state = DoorState::Unlocked;
            inner.generation += 1;
            self.schedule_relock(&mut inner);
            opened
        };

        if opened {
            self.announce(DoorState::Unlocked, &format!("Door unlocked ({trigger})"))
                .await;
        } else {
            debug!(%trigger, "Door already unlocked, relock timer restarted");
        }
        DoorState::Unlocked
    }

    fn schedule_relock(&self, inner: &mut Inner) {
        if let Some(timer) = inner.relock.take() {
            timer.abort();
        }

        let generation = inner.generation;
        let delay = self.config.relock_after;
        let controller = self.clone();

        inner.relock = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.relock(generation).await;
        }));
    }

    async fn relock(&self, generation: u64) {
        let _transition = self.transition.lock().await;
        {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != DoorState::Unlocked {
                return;
            }
            inner.state = DoorState::Locked;
            inner.relock = None;
        }

        self.announce(DoorState::Locked, "Door locked").await;
    }

    async fn announce(&self, state: DoorState, message: &str) {
        info!(%state, "Door state changed");
        self.publish_state(state).await;
        self.log.record(message).await;
    }

    async fn publish_state(&self, state: DoorState) {
        let payload = state.to_string();
        if let Err(e) = self
            .log
            .bus()
            .publish(&self.config.status_topic, &payload)
            .await
        {
            warn!(%state, "Door status not published: {}", e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorlock_bus::MemoryBus;

    #[tokio::test(start_paused = true)]
    async fn test_starts_locked() {
        let bus = MemoryBus::new();
        let mut status = bus.subscribe(TOPIC_DOOR_STATUS).await.unwrap();
        let controller = DoorController::new(EventLog::new(bus), DoorConfig::default());

        controller.start().await;

        assert_eq!(controller.state(), DoorState::Locked);
        assert_eq!(status.recv().await.unwrap().payload, "Locked");
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_relock_and_trigger_publish_in_order() {
        let bus = MemoryBus::new();
        let mut status = bus.subscribe(TOPIC_DOOR_STATUS).await.unwrap();
        let config = DoorConfig::default();
        let relock_after = config.relock_after;
        let controller = DoorController::new(EventLog::new(bus), config);
        controller.trigger(DoorTrigger::Unlock).await;

        // The relock fires while another transition is in flight, and a
        // trigger queues up behind it.
        let in_flight = controller.transition.lock().await;
        tokio::time::sleep(relock_after + Duration::from_millis(1)).await;
        let reopen = tokio::spawn({
            let controller = controller.clone();
            async move { controller.trigger(DoorTrigger::Toggle).await }
        });
        tokio::task::yield_now().await;
        drop(in_flight);
        reopen.await.unwrap();

        let mut published = Vec::new();
        while let Some(message) = status.try_recv() {
            published.push(message.payload);
        }
        assert_eq!(published, ["Unlocked", "Locked", "Unlocked"]);
        assert_eq!(controller.state(), DoorState::Unlocked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relock_ignores_stale_generation() {
        let controller = DoorController::new(EventLog::new(MemoryBus::new()), DoorConfig::default());
        controller.trigger(DoorTrigger::Unlock).await;

        controller.relock(0).await;
        assert_eq!(controller.state(), DoorState::Unlocked);

        controller.relock(1).await;
        assert_eq!(controller.state(), DoorState::Locked);
    }
}
