//! clocklink: bounded clock synchronization over byte-oriented links
//!
//! This library estimates the mapping between the free-running microsecond
//! counter of a remote measurement device (typically a microcontroller on a
//! USB or serial link) and the host's monotonic clock, together with proven
//! bounds on the one-way delay asymmetry. After synchronization any timestamp
//! reported by the remote can be translated into host time with a known
//! worst-case uncertainty window.
//!
//! The transport is abstracted behind [`Channel`]; the library ships a
//! blocking serial implementation and callers may provide their own (USB bulk
//! endpoints, TCP bridges, simulations).
//!
//! # Examples
//!
//! ```no_run
//! use clocklink::{SerialChannel, SyncConfig, SyncSession};
//!
//! let channel = SerialChannel::open("/dev/ttyACM0", 115_200).unwrap();
//! let mut session = SyncSession::new(channel, SyncConfig::default()).unwrap();
//!
//! let estimate = session.full_sync().unwrap();
//! println!("remote clock window: {}", estimate);
//!
//! // Later: re-measure the bounds without touching the base time to see
//! // whether the clocks have drifted apart.
//! let refreshed = session.refresh_bounds().unwrap();
//! println!("drift check: {}", refreshed);
//! ```

pub mod core;

pub mod channel;
pub mod protocol;
pub mod sync;
pub mod time;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used items
pub use crate::core::{ClockEstimate, Error, LinkStats, Result, SyncPhase};
pub use channel::{Channel, SerialChannel};
pub use sync::{PacingConfig, SyncConfig, SyncSession};
pub use time::{HostClock, UptimeClock};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
