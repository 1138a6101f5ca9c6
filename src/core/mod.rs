//! Core types for bounded clock synchronization
//!
//! This module contains the fundamental building blocks used throughout the
//! library: the error taxonomy and the clock-state data model.

pub mod error;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{ClockEstimate, ClockState, LinkStats, SyncPhase};

/// Maximum size of a single inbound message in bytes (link MTU)
pub const MAX_MESSAGE_LEN: usize = 512;

/// Number of probe digits exchanged per direction in one round
pub const DIGIT_COUNT: usize = 9;

/// Number of combined probe rounds in a full synchronization
pub const DEFAULT_SYNC_ROUNDS: u32 = 7;
