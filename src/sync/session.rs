use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::channel::Channel;
use crate::core::{
    ClockEstimate, ClockState, Error, LinkStats, Result, SyncPhase, DEFAULT_SYNC_ROUNDS,
};
use crate::protocol::command::{CMD_PING, CMD_RESET, CMD_TIME_NOW, CMD_VERSION};
use crate::time::{HostClock, UptimeClock};
use super::estimator::{BoundEstimator, PacingConfig};

/// Configuration for a synchronization session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Combined probe rounds per synchronization or refresh
    pub rounds: u32,
    /// Timeout for each single receive on the channel
    pub receive_timeout: Duration,
    /// Inter-probe pacing policy
    pub pacing: PacingConfig,
    /// Sentinel half-width the working bounds are reset to before a refresh,
    /// microseconds
    pub refresh_window_us: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            rounds: DEFAULT_SYNC_ROUNDS,
            receive_timeout: Duration::from_millis(20),
            pacing: PacingConfig::default(),
            refresh_window_us: 10_000_000,
        }
    }
}

impl SyncConfig {
    /// Checks the configuration for values the estimator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(Error::config("rounds must be at least 1"));
        }
        if self.receive_timeout.is_zero() {
            return Err(Error::config("receive_timeout must be non-zero"));
        }
        if self.pacing.spread_divisor < 1 {
            return Err(Error::config("pacing.spread_divisor must be at least 1"));
        }
        if self.pacing.min_sleep_us < 0 || self.pacing.min_sleep_us > self.pacing.max_sleep_us {
            return Err(Error::config(
                "pacing sleep bounds must satisfy 0 <= min <= max",
            ));
        }
        if self.refresh_window_us <= 0 {
            return Err(Error::config("refresh_window_us must be positive"));
        }
        Ok(())
    }
}

/// Drives bounded clock synchronization against one device connection
///
/// The session owns the channel and the [`ClockState`] for that connection;
/// no other component mutates the state. All operations are synchronous and
/// must not run concurrently against the same device; callers wanting an
/// overall timeout enforce it externally and treat an interrupted session as
/// unsynchronized until the next successful [`full_sync`].
///
/// [`full_sync`]: SyncSession::full_sync
pub struct SyncSession<C: Channel, K: HostClock = UptimeClock> {
    channel: C,
    clock: K,
    state: ClockState,
    config: SyncConfig,
}

impl<C: Channel> SyncSession<C, UptimeClock> {
    /// Creates a session over the given channel with the production clock
    pub fn new(channel: C, config: SyncConfig) -> Result<Self> {
        Self::with_clock(channel, UptimeClock::new(), config)
    }
}

impl<C: Channel, K: HostClock> SyncSession<C, K> {
    /// Creates a session with an explicit time source
    pub fn with_clock(channel: C, clock: K, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(SyncSession {
            channel,
            clock,
            state: ClockState::new(),
            config,
        })
    }

    /// Full synchronization: zeroing, probe rounds, base-time normalization
    ///
    /// On success `min_error == 0` and `max_error` is the residual
    /// uncertainty of any translated timestamp. Any failure leaves the
    /// session unsynchronized; the caller decides whether to retry.
    pub fn full_sync(&mut self) -> Result<ClockEstimate> {
        self.state.phase = SyncPhase::Unsynchronized;
        let outcome = {
            let mut estimator = BoundEstimator::new(
                &mut self.channel,
                &self.clock,
                &mut self.state,
                &self.config,
            );
            estimator.zero().and_then(|()| estimator.run_rounds())
        };
        if let Err(e) = outcome {
            self.state.phase = SyncPhase::Unsynchronized;
            return Err(e);
        }

        // Shift the time origin so the proven lower bound becomes zero,
        // leaving [0, max_error] as the uncertainty window.
        self.state.base_offset += self.state.min_error;
        self.state.max_error -= self.state.min_error;
        self.state.min_error = 0;
        self.state.phase = SyncPhase::Normalized;

        let estimate = self.state.estimate();
        info!(%estimate, "clocks synchronized");
        Ok(estimate)
    }

    /// Re-measures the lag bounds without re-zeroing
    ///
    /// The base offset is left untouched, so comparing the fresh window with
    /// the previous one reveals drift: a significantly positive `min_error`
    /// means the link has drifted and a full re-sync is warranted (a policy
    /// left to the caller). On transport failure the prior bounds are
    /// restored.
    pub fn refresh_bounds(&mut self) -> Result<ClockEstimate> {
        if self.state.phase != SyncPhase::Normalized {
            return Err(Error::invalid_state(
                "refresh_bounds() requires a completed full_sync",
            ));
        }

        let prior = (self.state.min_error, self.state.max_error);
        self.state.min_error = -self.config.refresh_window_us;
        self.state.max_error = self.config.refresh_window_us;
        self.state.phase = SyncPhase::Bounded;

        let outcome = BoundEstimator::new(
            &mut self.channel,
            &self.clock,
            &mut self.state,
            &self.config,
        )
        .run_rounds();

        match outcome {
            Ok(()) => {
                self.state.phase = SyncPhase::Normalized;
                let estimate = self.state.estimate();
                info!(%estimate, "bounds refreshed");
                Ok(estimate)
            }
            Err(e) => {
                self.state.min_error = prior.0;
                self.state.max_error = prior.1;
                self.state.phase = SyncPhase::Normalized;
                Err(e)
            }
        }
    }

    /// Translates a remote timestamp onto the host's monotonic timeline
    ///
    /// Pure function of the base offset; valid only after a successful
    /// [`full_sync`]. The stated uncertainty of the result is the current
    /// `max_error - min_error` (post-normalization, `max_error`).
    ///
    /// [`full_sync`]: SyncSession::full_sync
    pub fn translate(&self, remote_us: i64) -> Result<i64> {
        if self.state.phase != SyncPhase::Normalized {
            return Err(Error::invalid_state(
                "translate() requires a completed full_sync",
            ));
        }
        Ok(remote_us + self.state.base_offset)
    }

    /// Host time in the session frame, directly comparable to remote stamps
    pub fn local_micros(&self) -> i64 {
        self.clock.now_micros() - self.state.estimate().base_offset
    }

    /// Snapshot of the current estimate
    pub fn estimate(&self) -> ClockEstimate {
        self.state.estimate()
    }

    /// Current phase of the session state machine
    pub fn phase(&self) -> SyncPhase {
        self.state.phase()
    }

    /// Access to the underlying channel, e.g. for application traffic
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Clears the device's capture state and discards its acknowledgement
    pub fn reset_remote(&mut self) -> Result<()> {
        self.channel.send(&[CMD_RESET])?;
        self.channel.flush()
    }

    /// Single round trip; `None` if the device did not answer in time
    pub fn ping(&mut self) -> Result<Option<Duration>> {
        self.channel.flush()?;
        let t0 = self.clock.now_micros();
        self.channel.send(&[CMD_PING])?;
        let got = self
            .channel
            .receive(&mut self.state.recv_buf, self.config.receive_timeout)?;
        if !got {
            return Ok(None);
        }
        let rtt = (self.clock.now_micros() - t0).max(0) as u64;
        Ok(Some(Duration::from_micros(rtt)))
    }

    /// Measures link round-trip statistics over `samples` time requests
    ///
    /// Useful as a health check before attempting synchronization; timed-out
    /// requests are simply excluded.
    pub fn link_stats(&mut self, samples: usize) -> Result<LinkStats> {
        if samples == 0 {
            return Err(Error::config("link_stats needs at least one sample"));
        }
        self.channel.flush()?;

        let mut rtts: Vec<i64> = Vec::with_capacity(samples);
        for _ in 0..samples {
            let t0 = self.clock.now_micros();
            self.channel.send(&[CMD_TIME_NOW])?;
            let got = self
                .channel
                .receive(&mut self.state.recv_buf, self.config.receive_timeout)?;
            if got {
                rtts.push(self.clock.now_micros() - t0);
            }
        }
        if rtts.is_empty() {
            return Err(Error::handshake("no time requests were answered"));
        }

        let min = rtts.iter().copied().min().unwrap_or(0);
        let max = rtts.iter().copied().max().unwrap_or(0);
        let mean = rtts.iter().sum::<i64>() as f64 / rtts.len() as f64;
        let variance = rtts
            .iter()
            .map(|&r| (r as f64 - mean).powi(2))
            .sum::<f64>()
            / rtts.len() as f64;

        Ok(LinkStats {
            samples: rtts.len(),
            min: Duration::from_micros(min.max(0) as u64),
            max: Duration::from_micros(max.max(0) as u64),
            mean: Duration::from_micros(mean.max(0.0) as u64),
            stddev: Duration::from_micros(variance.sqrt() as u64),
        })
    }

    /// Reads the device firmware version string
    pub fn remote_version(&mut self) -> Result<Option<String>> {
        self.channel.flush()?;
        self.channel.send(&[CMD_VERSION])?;
        let got = self
            .channel
            .receive(&mut self.state.recv_buf, self.config.receive_timeout)?;
        if !got {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&self.state.recv_buf).trim().to_string(),
        ))
    }
}
