use std::time::Duration;

use bytes::BytesMut;
use tracing::warn;

use crate::channel::Channel;
use crate::core::{Result, DIGIT_COUNT};
use super::command::{digit_byte, CMD_SYNC_READOUT};

/// Which side sent the probe digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeDirection {
    /// Host sent digits, remote timestamped their receipt
    Outbound,
    /// Remote sent digits, host timestamped their receipt
    Inbound,
}

/// One digit exchange: nine (local, remote) microsecond pairs
///
/// A zero timestamp marks a missing sample (timeout, dropped byte, garbled
/// reply); [`samples`] skips those so they never enter the statistics.
///
/// [`samples`]: ProbeRound::samples
#[derive(Debug)]
pub struct ProbeRound {
    pub direction: ProbeDirection,
    pub local: [i64; DIGIT_COUNT],
    pub remote: [i64; DIGIT_COUNT],
}

impl ProbeRound {
    /// Round where the host was the sender
    pub fn outbound(local: [i64; DIGIT_COUNT], remote: [i64; DIGIT_COUNT]) -> Self {
        ProbeRound {
            direction: ProbeDirection::Outbound,
            local,
            remote,
        }
    }

    /// Round where the remote was the sender
    pub fn inbound(local: [i64; DIGIT_COUNT], remote: [i64; DIGIT_COUNT]) -> Self {
        ProbeRound {
            direction: ProbeDirection::Inbound,
            local,
            remote,
        }
    }

    /// Pairs where both timestamps are present
    pub fn samples(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.local
            .iter()
            .zip(self.remote.iter())
            .filter(|(l, r)| **l != 0 && **r != 0)
            .map(|(l, r)| (*l, *r))
    }
}

/// Asks the remote for the timestamps it recorded for digits 1..9
///
/// One `R` request per digit; the device replies in digit order. A timeout or
/// a malformed/mismatched reply leaves that slot at zero (missing sample) and
/// the readout continues; only structural transport failure is an error.
pub fn read_remote_timestamps<C: Channel>(
    channel: &mut C,
    buf: &mut BytesMut,
    timeout: Duration,
) -> Result<[i64; DIGIT_COUNT]> {
    let mut times = [0i64; DIGIT_COUNT];
    for (i, slot) in times.iter_mut().enumerate() {
        channel.send(&[CMD_SYNC_READOUT])?;
        if !channel.receive(buf, timeout)? {
            continue;
        }
        match parse_readout(digit_byte(i), buf) {
            Some(t) => *slot = t,
            None => warn!(
                reply = %String::from_utf8_lossy(buf),
                "bad readout reply for digit {}",
                i + 1
            ),
        }
    }
    Ok(times)
}

/// Parses a readout reply: `digit, separator, integer`
///
/// The firmware sends `'3' ' ' 12345`, the Python bridge `'3' ':' 12345`;
/// exactly one separator byte is skipped either way. Returns `None` when the
/// echoed digit does not match the requested one or the integer is garbled.
pub(crate) fn parse_readout(expected_digit: u8, reply: &[u8]) -> Option<i64> {
    if reply.len() < 3 || reply[0] != expected_digit {
        return None;
    }
    parse_micros(&reply[2..])
}

/// Parses a leading ASCII integer, ignoring any trailing bytes
pub(crate) fn parse_micros(text: &[u8]) -> Option<i64> {
    let (negative, digits) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        _ => (false, text),
    };
    let mut value: i64 = 0;
    let mut seen = false;
    for &b in digits {
        if !b.is_ascii_digit() {
            break;
        }
        seen = true;
        value = value.checked_mul(10)?.checked_add((b - b'0') as i64)?;
    }
    if !seen {
        return None;
    }
    Some(if negative { -value } else { value })
}
