//! The message bus seam shared by every device process.

use crate::Result;
use std::future::Future;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

/// A single message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe transport with at-most-once, best-effort delivery.
///
/// Implementations are cheap handles: cloning shares the same underlying
/// connection, so every listener task can own its own copy.
pub trait MessageBus: Clone + Send + Sync + 'static {
    /// Publish `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Disconnected` while the transport is down, or
    /// `BusError::Publish` if the request could not be queued. Nothing is
    /// retried; callers decide whether a lost message matters.
    fn publish(&self, topic: &str, payload: &str) -> impl Future<Output = Result<()>> + Send;

    /// Subscribe to a topic filter.
    ///
    /// The filter accepts MQTT wildcards (`+` for one level, `#` for the
    /// remainder). Only messages published after this call are delivered.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Subscribe` if the transport rejects the request.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<Subscription>> + Send;

    /// Whether the transport currently believes it is connected.
    fn is_connected(&self) -> bool;
}

/// A stream of messages matching one topic filter.
#[derive(Debug)]
pub struct Subscription {
    filter: String,
    receiver: broadcast::Receiver<BusMessage>,
}

impl Subscription {
    pub(crate) fn new(filter: impl Into<String>, receiver: broadcast::Receiver<BusMessage>) -> Self {
        Self {
            filter: filter.into(),
            receiver,
        }
    }

    /// The topic filter this subscription was created with.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Wait for the next matching message.
    ///
    /// Returns `None` once the bus has been dropped. Messages skipped because
    /// this subscriber fell behind are logged and lost.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if topic_matches(&self.filter, &message.topic) => return Some(message),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        filter = %self.filter,
                        skipped,
                        "Subscriber lagged, messages dropped"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next matching message if one is already queued.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) if topic_matches(&self.filter, &message.topic) => return Some(message),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(filter = %self.filter, skipped, "Subscriber lagged, messages dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Check whether `topic` matches an MQTT topic `filter`.
///
/// # Examples
///
/// ```
/// use doorlock_bus::topic_matches;
///
/// assert!(topic_matches("device/keypad", "device/keypad"));
/// assert!(topic_matches("device/+", "device/bell"));
/// assert!(topic_matches("status/#", "status/door"));
/// assert!(!topic_matches("device/+", "status/door"));
/// ```
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
