//! Door actuation.
//!
//! - [`DoorController`]: the `Locked`/`Unlocked` state machine with its
//!   relock timer, announcing every transition on `status/door`
//! - [`DoorCommandListener`]: drives the controller from `unlock` and
//!   `toggle` on `device/command`
//! - [`DoorButton`]: a debounced physical button that publishes its command
//! - [`BellListener`]: turns doorbell presses into status log lines
//!
//! # Example
//!
//! ```
//! use doorlock_bus::{EventLog, MemoryBus};
//! use doorlock_door::{DoorConfig, DoorController, DoorState, DoorTrigger};
//!
//! # async fn example() {
//! let controller = DoorController::new(EventLog::new(MemoryBus::new()), DoorConfig::default());
//! controller.start().await;
//!
//! controller.trigger(DoorTrigger::Unlock).await;
//! assert_eq!(controller.state(), DoorState::Unlocked);
//! # }
//! ```

mod bell;
mod button;
mod controller;
mod debounce;
mod listener;
mod state;

pub use bell::BellListener;
pub use button::DoorButton;
pub use controller::{DoorConfig, DoorController};
pub use debounce::Debouncer;
pub use listener::DoorCommandListener;
pub use state::{DoorState, DoorTrigger};
