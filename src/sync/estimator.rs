use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::core::{ClockState, Error, Result, SyncPhase, DIGIT_COUNT};
use crate::protocol::command::{digit_byte, digit_index, CMD_SYNC_SEND, CMD_SYNC_ZERO};
use crate::protocol::probe::{self, ProbeRound};
use crate::time::HostClock;
use super::session::SyncConfig;

/// Inter-probe pacing policy
///
/// The sleep between outbound digits scales with the current uncertainty:
/// wider bounds allow sparser probes that are still informative, while the
/// floor keeps probing responsive on well-synchronized links and the ceiling
/// keeps it from crawling on poor ones. Tunable per transport rather than a
/// protocol requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Smallest sleep between digits, microseconds
    pub min_sleep_us: i64,
    /// Largest sleep between digits, microseconds
    pub max_sleep_us: i64,
    /// Fraction of the bounds spread to sleep (spread / divisor)
    pub spread_divisor: i64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            min_sleep_us: 70,
            max_sleep_us: 700,
            spread_divisor: 10,
        }
    }
}

impl PacingConfig {
    /// Sleep time for the current bounds spread
    pub(crate) fn sleep_for_spread(&self, spread_us: i64) -> i64 {
        (spread_us / self.spread_divisor).clamp(self.min_sleep_us, self.max_sleep_us)
    }
}

/// Tightens the lag bounds of a [`ClockState`] through probe rounds
///
/// Each direction is a monotone fold: the lower bound only ever rises, the
/// upper bound only ever falls, so repeated rounds can tighten the window but
/// never loosen it. A bound proven against a link that later degrades is kept
/// as-is; only a bounds refresh (which resets to sentinels first) can reveal
/// the degradation.
pub(crate) struct BoundEstimator<'a, C: Channel, K: HostClock> {
    channel: &'a mut C,
    clock: &'a K,
    state: &'a mut ClockState,
    config: &'a SyncConfig,
}

impl<'a, C: Channel, K: HostClock> BoundEstimator<'a, C, K> {
    pub fn new(
        channel: &'a mut C,
        clock: &'a K,
        state: &'a mut ClockState,
        config: &'a SyncConfig,
    ) -> Self {
        BoundEstimator {
            channel,
            clock,
            state,
            config,
        }
    }

    /// Host time in the session frame (relative to the base offset)
    fn local_micros(&self) -> i64 {
        self.clock.now_micros() - self.state.base_offset
    }

    /// Coarse initial alignment: zero the remote clock with a single command
    ///
    /// Records the local send time as the provisional base offset and uses
    /// the exchange's round trip as a loose first ceiling on the lag.
    pub fn zero(&mut self) -> Result<()> {
        self.channel.flush()?;
        self.state.base_offset = self.clock.now_micros();
        self.channel.send(&[CMD_SYNC_ZERO])?;
        let acked = self
            .channel
            .receive(&mut self.state.recv_buf, self.config.receive_timeout)?;
        if !acked {
            return Err(Error::handshake("zero command not acknowledged"));
        }
        self.state.max_error = self.local_micros();
        self.state.min_error = 0;
        self.state.phase = SyncPhase::Zeroed;
        debug!(
            reply = %String::from_utf8_lossy(&self.state.recv_buf),
            rtt_us = self.state.max_error,
            "remote clock zeroed"
        );
        Ok(())
    }

    /// Outbound direction: host sends digits, raising the lower bound
    ///
    /// A digit cannot arrive before it was sent, so in a consistent frame the
    /// largest observed `local_send - remote_receipt` is a proven lower bound
    /// on the lag correction.
    pub fn improve_lower_bound(&mut self) -> Result<()> {
        let spread = self.state.max_error - self.state.min_error;
        let sleep_us = self.config.pacing.sleep_for_spread(spread);

        self.channel.flush()?;
        let mut local_sent = [0i64; DIGIT_COUNT];
        for (i, stamp) in local_sent.iter_mut().enumerate() {
            *stamp = self.local_micros();
            self.channel.send_nowait(digit_byte(i))?;
            self.clock.sleep_micros(sleep_us);
        }

        let remote_received = probe::read_remote_timestamps(
            self.channel,
            &mut self.state.recv_buf,
            self.config.receive_timeout,
        )?;

        let round = ProbeRound::outbound(local_sent, remote_received);
        for (local, remote) in round.samples() {
            let dt = local - remote;
            if dt > self.state.min_error {
                self.state.min_error = dt;
            }
        }

        debug!(
            min_us = self.state.min_error,
            max_us = self.state.max_error,
            sleep_us,
            "bounds after outbound probes"
        );
        Ok(())
    }

    /// Inbound direction: remote sends digits, lowering the upper bound
    ///
    /// Digits may arrive out of value order; each message identifies its own
    /// sample slot. The mirror argument applies: the smallest observed
    /// `local_receipt - remote_send` is a proven upper bound.
    pub fn improve_upper_bound(&mut self) -> Result<()> {
        self.channel.send_nowait(CMD_SYNC_SEND)?;

        let mut local_received = [0i64; DIGIT_COUNT];
        for _ in 0..DIGIT_COUNT {
            let got = self
                .channel
                .receive(&mut self.state.recv_buf, self.config.receive_timeout)?;
            if !got {
                continue;
            }
            let t_local = self.local_micros();
            match self.state.recv_buf.first().and_then(|b| digit_index(*b)) {
                Some(idx) => local_received[idx] = t_local,
                None => warn!(
                    msg = %String::from_utf8_lossy(&self.state.recv_buf),
                    "bad incoming probe digit"
                ),
            }
        }

        // The device follows its digit burst with a terminator byte.
        self.channel.flush()?;

        let remote_sent = probe::read_remote_timestamps(
            self.channel,
            &mut self.state.recv_buf,
            self.config.receive_timeout,
        )?;

        let round = ProbeRound::inbound(local_received, remote_sent);
        for (local, remote) in round.samples() {
            let dt = local - remote;
            if dt < self.state.max_error {
                self.state.max_error = dt;
            }
        }

        debug!(
            min_us = self.state.min_error,
            max_us = self.state.max_error,
            "bounds after inbound probes"
        );
        Ok(())
    }

    /// One combined round: outbound first, then inbound
    pub fn run_round(&mut self) -> Result<()> {
        self.improve_lower_bound()?;
        self.improve_upper_bound()
    }

    /// Runs the configured number of combined rounds
    pub fn run_rounds(&mut self) -> Result<()> {
        for _ in 0..self.config.rounds {
            self.run_round()?;
        }
        self.state.phase = SyncPhase::Bounded;
        Ok(())
    }
}
