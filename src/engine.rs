//! Phase engine: owns the timer state and is the only code that mutates it.
//!
//! The engine is driven by fixed-size ticks rather than wall-clock reads.
//! Each `tick(delta)` moves the clock by exactly `delta`, so any scheduling
//! jitter in the caller's loop accumulates as drift. That is accepted: a
//! coarse tick is cheaper than polling the clock and the error stays well
//! under a second per phase at the default tick size.
//!
//! The engine does no I/O. Phase ends and pause-budget resets are returned as
//! [`Signal`]s and the caller decides how to ring, persist or notify.

use chrono::{DateTime, Local, TimeDelta};
use std::time::Duration;

use crate::{
    config::Config,
    duration::to_delta,
    persist::{self, RestoreError, Snapshot, SnapshotStore},
    phase::{PhaseDurations, PhaseType, next_phase},
};

/// Floor applied to every phase duration regardless of what the config says.
pub const MIN_PHASE_DURATION: Duration = Duration::from_secs(1);

// ============================================================================
// Data Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    /// Time left in the current phase. Only negative inside a tick, before
    /// the rollover to the next phase.
    pub remaining: TimeDelta,
    /// Time spent paused in the current phase.
    pub paused: TimeDelta,
    pub phase: PhaseType,
    pub running: bool,
    /// 1-based index of the current phase since the start of the day.
    pub n: u32,
}

impl TimerState {
    pub fn fresh(durations: &PhaseDurations, running: bool) -> Self {
        Self {
            remaining: to_delta(durations.focus),
            paused: TimeDelta::zero(),
            phase: PhaseType::Focus,
            running,
            n: 1,
        }
    }
}

/// Something the caller has to act on after an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A phase finished, by expiry or by skipping. `n` is the counter of the
    /// phase that just started.
    PhaseEnded {
        ended: PhaseType,
        started: PhaseType,
        n: u32,
    },
    /// The pause budget ran out and the current phase was restarted.
    PauseBudgetExceeded { budget: Duration },
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone)]
pub struct PhaseEngine {
    state: TimerState,
    durations: PhaseDurations,
    autostart: bool,
    max_pause: Duration,
}

impl PhaseEngine {
    /// Fresh engine at the first focus phase.
    pub fn new(config: &Config) -> Self {
        let durations = config.durations.clamped_to(MIN_PHASE_DURATION);
        Self::with_state(config, TimerState::fresh(&durations, config.auto_start))
    }

    pub fn with_state(config: &Config, state: TimerState) -> Self {
        debug_assert!(state.n >= 1, "phase counter is 1-based");
        Self {
            state,
            durations: config.durations.clamped_to(MIN_PHASE_DURATION),
            autostart: config.auto_start,
            max_pause: config.max_pause_duration,
        }
    }

    /// Resume today's last snapshot from `store`, or start fresh.
    ///
    /// Never fails: the restore error, if any, is handed back so the caller
    /// can show it once.
    pub fn initialize(
        config: &Config,
        store: &dyn SnapshotStore,
        now: DateTime<Local>,
    ) -> (Self, Option<RestoreError>) {
        let durations = config.durations.clamped_to(MIN_PHASE_DURATION);
        let restored = store
            .read_last()
            .map_err(RestoreError::from)
            .and_then(|last| persist::restore(&last, &durations, now.date_naive()));

        match restored {
            Ok(state) => (Self::with_state(config, state), None),
            Err(err) => (Self::new(config), Some(err)),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn durations(&self) -> &PhaseDurations {
        &self.durations
    }

    pub fn phase_duration(&self) -> TimeDelta {
        to_delta(self.durations.get(self.state.phase))
    }

    /// Fraction of the current phase still left, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let total = self.phase_duration().num_milliseconds() as f64;
        let remaining = self.state.remaining.num_milliseconds() as f64;
        (remaining / total).clamp(0.0, 1.0)
    }

    pub fn snapshot(&self, now: DateTime<Local>) -> Snapshot {
        Snapshot::capture(&self.state, now)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Flip between running and paused. Whether pausing is allowed at all is
    /// the caller's decision.
    pub fn toggle(&mut self) {
        self.state.running = !self.state.running;
    }

    /// Advance the clock by `delta`.
    ///
    /// While paused, a tick that finds the pause budget already used up
    /// restarts the phase instead of adding more pause time. While running,
    /// reaching zero ends the phase; whatever part of `delta` overshoots the
    /// boundary is dropped and the next phase starts at its full duration.
    pub fn tick(&mut self, delta: Duration) -> Option<Signal> {
        let delta = to_delta(delta);

        if self.state.running {
            self.state.remaining -= delta;
            if self.state.remaining <= TimeDelta::zero() {
                return Some(self.next());
            }
            return None;
        }

        if self.state.paused >= to_delta(self.max_pause) {
            self.reset();
            return Some(Signal::PauseBudgetExceeded {
                budget: self.max_pause,
            });
        }
        self.state.paused += delta;
        None
    }

    /// Restart the current phase. Leaves the phase type and counter alone.
    pub fn reset(&mut self) {
        self.state.paused = TimeDelta::zero();
        self.state.remaining = self.phase_duration();
        self.state.running = self.autostart;
    }

    /// End the current phase and enter the next one.
    pub fn next(&mut self) -> Signal {
        let ended = self.state.phase;

        // The counter moves first; the sequencing rule reads the new value.
        self.state.n = self.state.n.saturating_add(1);
        let started = next_phase(ended, self.state.n);

        self.state.phase = started;
        self.state.paused = TimeDelta::zero();
        self.state.remaining = self.phase_duration();
        self.state.running = self.autostart;

        Signal::PhaseEnded {
            ended,
            started,
            n: self.state.n,
        }
    }
}
