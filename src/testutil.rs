//! Deterministic collaborators for testing the synchronization core
//!
//! `SimClock` is a virtual microsecond counter shared between the test, the
//! session under test, and `SimDevice`, an in-memory model of the measurement
//! firmware. Idle waits consume no virtual time; receiving a message that is
//! scheduled for the future advances the clock to its ready time, so every
//! test run is exactly reproducible.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use bytes::BytesMut;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::channel::Channel;
use crate::core::{Error, Result, DIGIT_COUNT};
use crate::protocol::command::{
    CMD_PING, CMD_RESET, CMD_SYNC_READOUT, CMD_SYNC_SEND, CMD_SYNC_ZERO, CMD_TIME_NOW,
    CMD_VERSION,
};
use crate::time::HostClock;

/// Shared virtual microsecond counter
#[derive(Clone)]
pub struct SimClock {
    now: Rc<Cell<i64>>,
}

impl SimClock {
    pub fn new() -> Self {
        SimClock {
            now: Rc::new(Cell::new(0)),
        }
    }

    pub fn now(&self) -> i64 {
        self.now.get()
    }

    pub fn advance(&self, micros: i64) {
        if micros > 0 {
            self.now.set(self.now.get() + micros);
        }
    }
}

impl HostClock for SimClock {
    fn now_micros(&self) -> i64 {
        self.now.get()
    }

    fn sleep_micros(&self, micros: i64) {
        self.advance(micros);
    }
}

/// Simulated measurement device behind a [`Channel`]
///
/// Mirrors the firmware protocol: zeroes its counter on `Z`, records digit
/// arrival stamps, bursts paced digits (plus a newline terminator) on `I`,
/// cycles destructive readout replies on `R`, and answers `P`/`T`/`V`/`F`.
/// Delay knobs model asymmetric latency, per-digit latency spikes, lost
/// digits, seeded jitter, a mute zero acknowledgement, and transport failure
/// after a number of sends.
pub struct SimDevice {
    now: Rc<Cell<i64>>,
    outbound_delay: i64,
    inbound_delay: i64,
    zero_outbound_delay: Option<i64>,
    digit_spacing: i64,
    out_extra: [i64; DIGIT_COUNT],
    in_extra: [i64; DIGIT_COUNT],
    dropped_digits: [bool; DIGIT_COUNT],
    mute_zero_ack: bool,
    jitter: Option<RefCell<(StdRng, i64)>>,
    remote_shift: i64,
    remote_base: i64,
    recorded: [i64; DIGIT_COUNT],
    readout_idx: usize,
    inbox: Vec<(i64, Vec<u8>)>,
    sends_remaining: Option<usize>,
}

impl SimDevice {
    pub fn new(clock: &SimClock) -> Self {
        SimDevice {
            now: Rc::clone(&clock.now),
            outbound_delay: 0,
            inbound_delay: 0,
            zero_outbound_delay: None,
            digit_spacing: 300,
            out_extra: [0; DIGIT_COUNT],
            in_extra: [0; DIGIT_COUNT],
            dropped_digits: [false; DIGIT_COUNT],
            mute_zero_ack: false,
            jitter: None,
            remote_shift: 0,
            remote_base: 0,
            recorded: [0; DIGIT_COUNT],
            readout_idx: 0,
            inbox: Vec::new(),
            sends_remaining: None,
        }
    }

    /// Host-to-device latency for every message
    pub fn with_outbound_delay(mut self, micros: i64) -> Self {
        self.outbound_delay = micros;
        self
    }

    /// Device-to-host latency for every message
    pub fn with_inbound_delay(mut self, micros: i64) -> Self {
        self.inbound_delay = micros;
        self
    }

    /// Latency override for the zero command only
    pub fn with_zero_outbound_delay(mut self, micros: i64) -> Self {
        self.zero_outbound_delay = Some(micros);
        self
    }

    /// Extra host-to-device latency per probe digit
    pub fn with_outbound_extra(mut self, extra: [i64; DIGIT_COUNT]) -> Self {
        self.out_extra = extra;
        self
    }

    /// Extra device-to-host latency per burst digit
    pub fn with_inbound_extra(mut self, extra: [i64; DIGIT_COUNT]) -> Self {
        self.in_extra = extra;
        self
    }

    /// Probe digits (by 0-based index) that never reach the device
    pub fn with_dropped_digits(mut self, indices: &[usize]) -> Self {
        for &i in indices {
            self.dropped_digits[i] = true;
        }
        self
    }

    /// Device never acknowledges the zero command
    pub fn with_mute_zero_ack(mut self) -> Self {
        self.mute_zero_ack = true;
        self
    }

    /// Seeded random extra latency in `0..=max_us` on every message leg
    pub fn with_jitter(mut self, seed: u64, max_us: i64) -> Self {
        self.jitter = Some(RefCell::new((StdRng::seed_from_u64(seed), max_us)));
        self
    }

    /// Shifts all subsequent remote clock readings, emulating drift
    pub fn shift_remote(&mut self, delta_us: i64) {
        self.remote_shift += delta_us;
    }

    /// Changes the device-to-host latency mid-test
    pub fn set_inbound_delay(&mut self, micros: i64) {
        self.inbound_delay = micros;
    }

    /// Makes every send fail after `n` more sends, emulating device loss
    pub fn fail_sends_after(&mut self, n: usize) {
        self.sends_remaining = Some(n);
    }

    pub fn has_pending_inbound(&self) -> bool {
        !self.inbox.is_empty()
    }

    fn jitter(&self) -> i64 {
        match &self.jitter {
            Some(cell) => {
                let (rng, max) = &mut *cell.borrow_mut();
                rng.gen_range(0..=*max)
            }
            None => 0,
        }
    }

    fn remote_time(&self, abs_us: i64) -> i64 {
        abs_us - self.remote_base + self.remote_shift
    }

    fn push_at(&mut self, ready_at: i64, msg: Vec<u8>) {
        self.inbox.push((ready_at, msg));
    }

    fn handle_byte(&mut self, byte: u8) {
        let now = self.now.get();
        match byte {
            CMD_SYNC_ZERO => {
                let arrival = now
                    + self.zero_outbound_delay.unwrap_or(self.outbound_delay)
                    + self.jitter();
                self.remote_base = arrival;
                self.recorded = [0; DIGIT_COUNT];
                self.readout_idx = 0;
                if !self.mute_zero_ack {
                    let ready = arrival + self.inbound_delay + self.jitter();
                    self.push_at(ready, b"z".to_vec());
                }
            }
            CMD_SYNC_READOUT => {
                let i = self.readout_idx;
                self.readout_idx = (self.readout_idx + 1) % DIGIT_COUNT;
                let arrival = now + self.outbound_delay + self.jitter();
                let reply = format!("{} {}", i + 1, self.recorded[i]).into_bytes();
                // Destructive readout: a slot reads as missing until the next
                // digit lands in it.
                self.recorded[i] = 0;
                self.push_at(arrival + self.inbound_delay + self.jitter(), reply);
            }
            CMD_SYNC_SEND => {
                let arrival = now + self.outbound_delay + self.jitter();
                for k in 0..DIGIT_COUNT {
                    let sent = arrival + k as i64 * self.digit_spacing;
                    self.recorded[k] = self.remote_time(sent);
                    let ready = sent + self.inbound_delay + self.in_extra[k] + self.jitter();
                    self.push_at(ready, format!("{}", k + 1).into_bytes());
                }
                self.readout_idx = 0;
                let tail = arrival + DIGIT_COUNT as i64 * self.digit_spacing;
                self.push_at(tail + self.inbound_delay, b"\n".to_vec());
            }
            digit @ b'1'..=b'9' => {
                let k = (digit - b'1') as usize;
                if !self.dropped_digits[k] {
                    let arrival = now + self.outbound_delay + self.out_extra[k] + self.jitter();
                    self.recorded[k] = self.remote_time(arrival);
                }
            }
            CMD_PING => {
                let ready = now + self.outbound_delay + self.inbound_delay + self.jitter();
                self.push_at(ready, b"pong".to_vec());
            }
            CMD_TIME_NOW => {
                let arrival = now + self.outbound_delay + self.jitter();
                let reply = self.remote_time(arrival).to_string().into_bytes();
                self.push_at(arrival + self.inbound_delay, reply);
            }
            CMD_VERSION => {
                let ready = now + self.outbound_delay + self.inbound_delay;
                self.push_at(ready, b"6".to_vec());
            }
            CMD_RESET => {
                self.recorded = [0; DIGIT_COUNT];
                self.readout_idx = 0;
                let ready = now + self.outbound_delay + self.inbound_delay;
                self.push_at(ready, b"ok".to_vec());
            }
            _ => {}
        }
    }

    fn check_send_budget(&mut self) -> Result<()> {
        if let Some(remaining) = self.sends_remaining.as_mut() {
            if *remaining == 0 {
                return Err(Error::transport("simulated device disconnect"));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

impl Channel for SimDevice {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_send_budget()?;
        for &b in bytes {
            self.handle_byte(b);
        }
        Ok(())
    }

    fn receive(&mut self, buf: &mut BytesMut, timeout: Duration) -> Result<bool> {
        buf.clear();
        let now = self.now.get();
        let deadline = now + timeout.as_micros() as i64;
        let earliest = self
            .inbox
            .iter()
            .enumerate()
            .min_by_key(|(_, (ready, _))| *ready)
            .map(|(i, (ready, _))| (i, *ready));
        match earliest {
            Some((i, ready)) if ready <= deadline => {
                let (_, msg) = self.inbox.remove(i);
                if ready > now {
                    self.now.set(ready);
                }
                buf.extend_from_slice(&msg);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
