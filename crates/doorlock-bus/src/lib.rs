//! Message bus layer for the door lock processes.
//!
//! Every device process talks to the others through a publish/subscribe bus
//! with at-most-once, best-effort delivery. This crate defines the
//! [`MessageBus`] seam and its two implementations:
//!
//! - **[`MemoryBus`]**: in-process loopback broker, used by tests and by
//!   single-process deployments
//! - **[`MqttBus`]**: MQTT transport with an unbounded fixed-backoff
//!   reconnect loop ([`MqttConnection::run`])
//!
//! It also provides [`EventLog`], which publishes operator-facing log lines
//! on `status/logs` and keeps the most recent ones in memory.
//!
//! # Example
//!
//! ```
//! use doorlock_bus::{MemoryBus, MessageBus};
//!
//! # async fn example() -> doorlock_bus::Result<()> {
//! let bus = MemoryBus::new();
//! let mut events = bus.subscribe("device/bell").await?;
//!
//! bus.publish("device/bell", "Bell pressed").await?;
//!
//! let message = events.recv().await.unwrap();
//! assert_eq!(message.payload, "Bell pressed");
//! # Ok(())
//! # }
//! ```

mod bus;
mod error;
mod journal;
mod memory;
mod mqtt;

pub use bus::{BusMessage, MessageBus, Subscription, topic_matches};
pub use error::{BusError, Result};
pub use journal::EventLog;
pub use memory::MemoryBus;
pub use mqtt::{MqttBus, MqttConfig, MqttConnection};
