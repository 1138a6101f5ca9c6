//! Byte-oriented duplex links
//!
//! The synchronization core is transport-agnostic: anything that can move
//! single bytes in both directions with bounded-time receives can carry the
//! probe protocol. [`Channel`] is that contract; [`SerialChannel`] is the
//! built-in implementation for serial devices.

use std::time::Duration;

use bytes::BytesMut;

use crate::core::Result;

mod serial;

pub use self::serial::SerialChannel;

/// Timeout for each drain step of the default [`Channel::flush`]
const FLUSH_POLL: Duration = Duration::from_millis(2);

/// Upper limit on drain iterations so a chattering device cannot hang us
const FLUSH_MAX_POLLS: usize = 64;

/// A byte-oriented duplex link to the remote device
///
/// Errors from these methods indicate structural transport failure (device
/// gone, port closed). A receive that simply sees no data within its timeout
/// is `Ok(false)`, not an error.
pub trait Channel {
    /// Sends bytes, blocking until the transport has accepted them
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Fires a single byte without waiting for transport completion
    ///
    /// Used for timing-sensitive probe digits: the call must return near
    /// immediately so the caller's send timestamp stays honest. A transport
    /// that cannot guarantee this biases the measured bounds (an accuracy
    /// concern, not a correctness one). The default forwards to [`send`].
    ///
    /// [`send`]: Channel::send
    fn send_nowait(&mut self, byte: u8) -> Result<()> {
        self.send(&[byte])
    }

    /// Receives one inbound message into `buf`, replacing its contents
    ///
    /// Returns `Ok(true)` if anything arrived within `timeout`, `Ok(false)`
    /// on timeout. At most [`MAX_MESSAGE_LEN`] bytes are delivered per call.
    ///
    /// [`MAX_MESSAGE_LEN`]: crate::core::MAX_MESSAGE_LEN
    fn receive(&mut self, buf: &mut BytesMut, timeout: Duration) -> Result<bool>;

    /// Discards all inbound data that is already buffered
    ///
    /// The default drains with repeated short-timeout receives and gives up
    /// after a fixed number of polls, so it never blocks indefinitely.
    fn flush(&mut self) -> Result<()> {
        let mut scratch = BytesMut::new();
        for _ in 0..FLUSH_MAX_POLLS {
            if !self.receive(&mut scratch, FLUSH_POLL)? {
                break;
            }
        }
        Ok(())
    }
}
