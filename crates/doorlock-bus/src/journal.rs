//! Operator-facing event log.

use crate::MessageBus;
use chrono::Local;
use doorlock_core::constants::{RECENT_LOG_CAPACITY, TOPIC_LOGS};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Publishes timestamped, human-readable log lines on `status/logs`.
///
/// Each line has the form `[YYYY-MM-DD HH:MM:SS] message` in local time.
/// The most recent lines are also kept in memory so a dashboard that
/// attaches late can be shown recent history.
#[derive(Debug, Clone)]
pub struct EventLog<B> {
    bus: B,
    topic: String,
    capacity: usize,
    recent: Arc<Mutex<VecDeque<String>>>,
}

impl<B: MessageBus> EventLog<B> {
    /// Log publishing to the standard `status/logs` topic.
    pub fn new(bus: B) -> Self {
        Self::with_topic(bus, TOPIC_LOGS)
    }

    pub fn with_topic(bus: B, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            capacity: RECENT_LOG_CAPACITY,
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(RECENT_LOG_CAPACITY))),
        }
    }

    /// Record one event.
    ///
    /// Publishing is best effort: while the bus is down the line is only
    /// kept locally and written to the process log.
    pub async fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let line = format!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        info!(target: "doorlock::events", "{}", message);

        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(line.clone());
        }

        if let Err(e) = self.bus.publish(&self.topic, &line).await {
            debug!(topic = %self.topic, "Log line not published: {}", e);
        }
    }

    /// Most recent lines, oldest first.
    pub fn recent(&self) -> Vec<String> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// The bus this log publishes on.
    pub fn bus(&self) -> &B {
        &self.bus
    }
}
