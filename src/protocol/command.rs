//! Wire command alphabet
//!
//! Single ASCII bytes, chosen to match the device firmware and to keep wire
//! traces human-readable. Probe digits are '1'..'9'; any nine distinct bytes
//! would work as long as both ends agree.

use crate::core::DIGIT_COUNT;

/// Reset the device's capture state
pub const CMD_RESET: u8 = b'F';
/// Ask the device to send its probe digits, paced, for inbound measurement
pub const CMD_SYNC_SEND: u8 = b'I';
/// Ping, answered with a single reply
pub const CMD_PING: u8 = b'P';
/// Read out the next recorded digit timestamp
pub const CMD_SYNC_READOUT: u8 = b'R';
/// Report the device's current time
pub const CMD_TIME_NOW: u8 = b'T';
/// Zero the device clock, answered with a one-byte acknowledgement
pub const CMD_SYNC_ZERO: u8 = b'Z';
/// Report the firmware version
pub const CMD_VERSION: u8 = b'V';

/// Wire byte for probe digit `index` (0-based)
pub fn digit_byte(index: usize) -> u8 {
    debug_assert!(index < DIGIT_COUNT);
    b'1' + index as u8
}

/// 0-based sample slot for a received digit byte, if it is in the valid set
pub fn digit_index(byte: u8) -> Option<usize> {
    if (b'1'..=b'9').contains(&byte) {
        Some((byte - b'1') as usize)
    } else {
        None
    }
}
