//! MQTT transport.
//!
//! [`MqttBus`] is the handle used by listeners to publish and subscribe.
//! [`MqttConnection`] owns the rumqttc event loop and must be driven with
//! [`MqttConnection::run`] on its own task; it reconnects forever with a
//! fixed backoff and restores every subscription once the broker accepts
//! the new session.

use crate::bus::{BusMessage, MessageBus, Subscription};
use crate::{BusError, Result};
use doorlock_core::constants::DEFAULT_RECONNECT_BACKOFF_MS;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Connection settings for the MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Delay between reconnect attempts.
    pub reconnect_backoff: Duration,
    /// Capacity of both the outgoing request queue and the incoming fan-out.
    pub capacity: usize,
}

impl MqttConfig {
    /// Settings for `host:port` with a unique client id built from `prefix`.
    pub fn new(host: impl Into<String>, port: u16, prefix: &str) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: format!("{prefix}-{}", Uuid::new_v4().simple()),
            ..Self::default()
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: format!("doorlock-{}", Uuid::new_v4().simple()),
            keep_alive: Duration::from_secs(30),
            reconnect_backoff: Duration::from_millis(DEFAULT_RECONNECT_BACKOFF_MS),
            capacity: 256,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    connected: AtomicBool,
    topics: Mutex<BTreeSet<String>>,
}

impl Shared {
    fn topics(&self) -> Vec<String> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn remember(&self, topic: &str) {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string());
    }
}

/// Bus handle backed by an MQTT broker.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    incoming: broadcast::Sender<BusMessage>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("connected", &self.is_connected())
            .field("topics", &self.shared.topics())
            .finish()
    }
}

impl MqttBus {
    /// Create the bus handle and the connection that drives it.
    ///
    /// Nothing touches the network until [`MqttConnection::run`] is polled.
    pub fn new(config: &MqttConfig) -> (Self, MqttConnection) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);

        let (client, eventloop) = AsyncClient::new(options, config.capacity.max(1));
        let (incoming, _) = broadcast::channel(config.capacity.max(1));
        let shared = Arc::new(Shared::default());

        let bus = Self {
            client: client.clone(),
            incoming: incoming.clone(),
            shared: Arc::clone(&shared),
        };
        let connection = MqttConnection {
            eventloop,
            client,
            incoming,
            shared,
            backoff: config.reconnect_backoff,
            broker: format!("{}:{}", config.host, config.port),
        };
        (bus, connection)
    }
}

impl MessageBus for MqttBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(BusError::Disconnected);
        }

        trace!(topic, payload, "Publishing");
        // try_publish never blocks: a full request queue drops the message.
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| BusError::publish(topic, e.to_string()))
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        self.shared.remember(topic);
        let receiver = self.incoming.subscribe();

        if self.is_connected() {
            self.client
                .subscribe(topic, QoS::AtMostOnce)
                .await
                .map_err(|e| BusError::subscribe(topic, e.to_string()))?;
        } else {
            debug!(topic, "Not connected, subscription deferred until connect");
        }

        Ok(Subscription::new(topic, receiver))
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

/// Owner of the MQTT event loop.
pub struct MqttConnection {
    eventloop: EventLoop,
    client: AsyncClient,
    incoming: broadcast::Sender<BusMessage>,
    shared: Arc<Shared>,
    backoff: Duration,
    broker: String,
}

impl MqttConnection {
    /// Drive the connection forever.
    ///
    /// Every failure, whether the initial connect or a later drop, is logged
    /// and retried after the fixed backoff. Abort the task to stop.
    pub async fn run(mut self) {
        info!(broker = %self.broker, "Connecting to MQTT broker");

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.shared.connected.store(true, Ordering::SeqCst);
                    info!(broker = %self.broker, "Connected to MQTT broker");
                    self.restore_subscriptions();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                    trace!(topic = %publish.topic, %payload, "Received");
                    let _ = self.incoming.send(BusMessage::new(publish.topic, payload));
                }
                Ok(_) => {}
                Err(e) => {
                    if self.shared.connected.swap(false, Ordering::SeqCst) {
                        warn!(broker = %self.broker, "Connection lost: {}", e);
                    } else {
                        warn!(
                            broker = %self.broker,
                            "Connect failed: {}, retrying in {:?}", e, self.backoff
                        );
                    }
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }

    fn restore_subscriptions(&self) {
        for topic in self.shared.topics() {
            match self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                Ok(()) => debug!(%topic, "Subscribed"),
                Err(e) => warn!(%topic, "Failed to restore subscription: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ids_are_unique() {
        let first = MqttConfig::new("broker", 1883, "door");
        let second = MqttConfig::new("broker", 1883, "door");

        assert!(first.client_id.starts_with("door-"));
        assert_ne!(first.client_id, second.client_id);
    }

    #[test]
    fn test_default_backoff() {
        let config = MqttConfig::default();
        assert_eq!(config.reconnect_backoff, Duration::from_secs(2));
        assert_eq!(config.port, 1883);
    }

    #[tokio::test]
    async fn test_publish_before_connect_is_rejected() {
        let (bus, _connection) = MqttBus::new(&MqttConfig::default());

        assert!(!bus.is_connected());
        assert_eq!(
            bus.publish("device/command", "list").await,
            Err(BusError::Disconnected)
        );
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_is_remembered() {
        let (bus, connection) = MqttBus::new(&MqttConfig::default());

        let subscription = bus.subscribe("device/keypad").await.unwrap();
        assert_eq!(subscription.filter(), "device/keypad");
        assert_eq!(connection.shared.topics(), vec!["device/keypad".to_string()]);
    }
}
