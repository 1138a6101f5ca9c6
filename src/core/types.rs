use std::fmt;
use std::time::Duration;

use bytes::BytesMut;

use super::MAX_MESSAGE_LEN;

/// Progress of a synchronization session
///
/// `Normalized` is the steady operating state; a bounds refresh passes
/// through `Bounded` again without disturbing the base offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No usable estimate; translation is invalid
    Unsynchronized,
    /// Coarse common origin established by the zero handshake
    Zeroed,
    /// Probe rounds have run but the origin is not yet re-centered
    Bounded,
    /// Origin shifted so the proven lower bound is zero
    Normalized,
}

/// Our best knowledge of the remote clock, all values in microseconds
///
/// This is the sole mutable entity of a synchronization session. It is owned
/// by exactly one [`crate::sync::SyncSession`] per device connection and
/// mutated only through that session's operations.
///
/// `base_offset` is the host counter reading at the moment the remote clock
/// was zeroed. Immediately after synchronization the remote clock is
/// guaranteed to lag the host session clock by between `min_error` and
/// `max_error`; normalization shifts the base so `min_error` becomes zero.
#[derive(Debug)]
pub struct ClockState {
    pub(crate) base_offset: i64,
    pub(crate) min_error: i64,
    pub(crate) max_error: i64,
    pub(crate) phase: SyncPhase,
    /// Scratch buffer for the most recent inbound message, reused across
    /// probes. Capacity is the link MTU; not retained between sessions.
    pub(crate) recv_buf: BytesMut,
}

impl ClockState {
    /// Creates a fresh state with undefined offset and bounds
    pub fn new() -> Self {
        ClockState {
            base_offset: 0,
            min_error: 0,
            max_error: 0,
            phase: SyncPhase::Unsynchronized,
            recv_buf: BytesMut::with_capacity(MAX_MESSAGE_LEN),
        }
    }

    /// Current sync phase
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Snapshot of the current estimate
    pub fn estimate(&self) -> ClockEstimate {
        ClockEstimate {
            base_offset: self.base_offset,
            min_error: self.min_error,
            max_error: self.max_error,
        }
    }
}

impl Default for ClockState {
    fn default() -> Self {
        ClockState::new()
    }
}

/// Snapshot of a synchronization result, all values in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEstimate {
    /// Host counter value at the remote clock's zero point
    pub base_offset: i64,
    /// Proven lower bound on the remote clock's lag
    pub min_error: i64,
    /// Proven upper bound on the remote clock's lag
    pub max_error: i64,
}

impl ClockEstimate {
    /// Width of the uncertainty window
    pub fn uncertainty(&self) -> i64 {
        self.max_error - self.min_error
    }

    /// Midpoint of the lag window, useful as a single-number correction
    pub fn mean_lag(&self) -> i64 {
        (self.min_error + self.max_error) / 2
    }
}

impl fmt::Display for ClockEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Remote clock [us]: baseOffset = {} lagBounds = ({}, {})",
            self.base_offset, self.min_error, self.max_error
        )
    }
}

/// Round-trip statistics for the underlying link
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// Number of round trips that completed
    pub samples: usize,
    /// Minimum round-trip time
    pub min: Duration,
    /// Maximum round-trip time
    pub max: Duration,
    /// Mean round-trip time
    pub mean: Duration,
    /// Standard deviation of the round-trip time
    pub stddev: Duration,
}
