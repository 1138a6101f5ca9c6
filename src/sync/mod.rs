//! Synchronization logic
//!
//! This module holds the bound estimator (the monotone tightening statistics
//! over probe rounds) and the session state machine that drives it:
//! `Unsynchronized -> Zeroed -> Bounded -> Normalized`.

pub mod estimator;
pub mod session;

pub use self::estimator::PacingConfig;
pub use self::session::{SyncConfig, SyncSession};
