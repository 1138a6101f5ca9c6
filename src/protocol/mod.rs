//! Probe protocol
//!
//! Defines the single-byte command vocabulary shared with the device firmware
//! and the single-shot exchanges used to measure delay in each direction: the
//! zero handshake, fire-and-forget probe digits, and the readout of the nine
//! remote timestamps recorded for the most recent digit sequence.

pub mod command;
pub mod probe;

pub use self::command::{digit_byte, digit_index};
pub use self::probe::{ProbeDirection, ProbeRound};
