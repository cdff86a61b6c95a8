//! Fingerprint sensor side of the door lock.
//!
//! The sensor accepts commands on `device/command` and answers, eventually,
//! with free-text lines on `device/fingerprint-events`. This crate turns that
//! fire-and-forget exchange into request/response calls:
//!
//! - [`CommandCorrelator`]: publishes `enroll/<n>` and `list`, then waits for
//!   the matching terminal response with a deadline
//! - [`PositionAllocator`]: picks the smallest free template position and
//!   enrolls it
//! - [`FingerprintListener`]: the consumer loop that decodes every sensor
//!   line and routes it to the correlator or toward the access session

pub mod allocator;
pub mod correlator;
pub mod listener;

pub use allocator::{AllocationError, PositionAllocator, smallest_free_position};
pub use correlator::{CommandCorrelator, CommandFamily, CorrelatorConfig, CorrelatorError};
pub use listener::FingerprintListener;
