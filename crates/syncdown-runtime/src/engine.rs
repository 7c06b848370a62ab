//! Timer engine - the per-context state machine and countdown
//!
//! While running, the engine holds only an absolute deadline. Every tick
//! re-derives the remaining seconds from `deadline - now`, so a late frame,
//! a suspended tab, or a skipped tick is corrected by the next one.

use std::sync::Arc;

use tracing::debug;

use syncdown_core::{coerce_minutes, minutes_to_secs, TimerEnvelope, WallTime};
use syncdown_state::EnvelopeSink;
use syncdown_time::{
    deadline_after, remaining_secs, Clock, CountdownConfig, TickSchedule, TickToken,
};

/// Logical timer state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerPhase {
    /// Fresh, reset, or reconfigured
    Idle,
    /// Counting toward a deadline
    Running,
    /// Stopped by a pause, whatever the remaining value
    Paused,
}

/// Result of one recomputation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The whole-second value changed; the envelope must be published
    Changed(TimerEnvelope),
    /// Same second as the previous tick
    Unchanged,
    /// Nothing was armed
    Idle,
    /// Token was cancelled or superseded
    Stale,
}

/// Timer engine for one context
pub struct TimerEngine {
    clock: Arc<dyn Clock>,
    config: CountdownConfig,
    configured_minutes: u32,
    /// Last derived value while running, stored value otherwise
    remaining_secs: i64,
    deadline: Option<WallTime>,
    /// Stopped by `pause`; cleared by start, reset and reconfigure
    paused: bool,
    label: Option<String>,
    schedule: TickSchedule,
    ticks: u64,
}

impl TimerEngine {
    /// Create an idle engine with the default duration
    pub fn new(clock: Arc<dyn Clock>, config: CountdownConfig) -> Self {
        let defaults = TimerEnvelope::defaults(clock.now());
        TimerEngine {
            clock,
            config,
            configured_minutes: defaults.configured_minutes(),
            remaining_secs: defaults.remaining_secs(),
            deadline: None,
            paused: false,
            label: None,
            schedule: TickSchedule::new(),
            ticks: 0,
        }
    }

    pub fn now(&self) -> WallTime {
        self.clock.now()
    }

    pub fn config(&self) -> &CountdownConfig {
        &self.config
    }

    /// Seconds left right now; derived live from the deadline while running
    pub fn time_left(&self) -> i64 {
        match self.deadline {
            Some(deadline) => remaining_secs(deadline, self.clock.now()),
            None => self.remaining_secs,
        }
    }

    pub fn configured_minutes(&self) -> u32 {
        self.configured_minutes
    }

    pub fn running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<WallTime> {
        self.deadline
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn phase(&self) -> TimerPhase {
        if self.running() {
            TimerPhase::Running
        } else if self.paused {
            TimerPhase::Paused
        } else {
            TimerPhase::Idle
        }
    }

    /// Whether a recomputation is armed
    pub fn is_ticking(&self) -> bool {
        self.schedule.is_armed()
    }

    pub fn pending_tick(&self) -> Option<TickToken> {
        self.schedule.pending()
    }

    /// Recomputations performed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current state as an envelope stamped with the current time
    pub fn envelope(&self) -> TimerEnvelope {
        self.envelope_at(self.clock.now())
    }

    /// Start or resume.
    ///
    /// A timer stopped at zero or in overtime restarts from the full
    /// configured duration. Starting a running timer keeps its deadline.
    pub fn start(&mut self) -> TimerEnvelope {
        let now = self.clock.now();
        if self.deadline.is_none() {
            let duration = if self.remaining_secs > 0 {
                self.remaining_secs
            } else {
                minutes_to_secs(self.configured_minutes)
            };
            self.deadline = Some(deadline_after(now, duration));
            self.remaining_secs = duration;
            self.paused = false;
            self.arm_if_live();
            debug!(duration, "countdown started");
        }
        self.envelope_at(now)
    }

    /// Freeze at the live value and cancel the pending tick
    pub fn pause(&mut self) -> TimerEnvelope {
        let now = self.clock.now();
        if let Some(deadline) = self.deadline.take() {
            self.remaining_secs = remaining_secs(deadline, now);
            self.paused = true;
        }
        self.schedule.cancel();
        self.envelope_at(now)
    }

    /// Back to the full configured duration, stopped
    pub fn reset(&mut self) -> TimerEnvelope {
        self.stop_at(minutes_to_secs(self.configured_minutes));
        self.envelope()
    }

    /// Change the configured duration; always stops the timer.
    ///
    /// Absent, zero, or negative input becomes one minute.
    pub fn reconfigure(&mut self, minutes: Option<i64>) -> TimerEnvelope {
        self.configured_minutes = coerce_minutes(minutes);
        self.stop_at(minutes_to_secs(self.configured_minutes));
        self.envelope()
    }

    /// Replace the display label without touching the countdown
    pub fn set_label(&mut self, label: Option<String>) -> TimerEnvelope {
        self.label = label.filter(|l| !l.trim().is_empty());
        self.envelope()
    }

    /// Run the recomputation armed under `token`
    pub fn tick(&mut self, token: TickToken) -> TickOutcome {
        if !self.schedule.fire(token) {
            return TickOutcome::Stale;
        }
        let Some(deadline) = self.deadline else {
            return TickOutcome::Stale;
        };

        let now = self.clock.now();
        let remaining = remaining_secs(deadline, now);
        let changed = remaining != self.remaining_secs;
        self.remaining_secs = remaining;
        self.ticks += 1;

        if !self.arm_if_live() {
            debug!(remaining, "overtime floor reached; countdown parked");
        }

        if changed {
            TickOutcome::Changed(self.envelope_at(now))
        } else {
            TickOutcome::Unchanged
        }
    }

    /// Run whatever tick is armed
    pub fn tick_pending(&mut self) -> TickOutcome {
        match self.schedule.pending() {
            Some(token) => self.tick(token),
            None => TickOutcome::Idle,
        }
    }

    /// Replace local state with an envelope written elsewhere.
    ///
    /// A running envelope contributes its deadline only; the remaining
    /// value it carries is stale by delivery latency and is re-derived.
    /// A stopped envelope without the pause marker reads as paused only
    /// when it is short of the full duration.
    pub fn adopt(&mut self, envelope: &TimerEnvelope) {
        self.configured_minutes = envelope.configured_minutes();
        self.label = envelope.label().map(str::to_owned);
        match envelope.deadline() {
            Some(deadline) => {
                self.deadline = Some(deadline);
                self.paused = false;
                self.remaining_secs = remaining_secs(deadline, self.clock.now());
                self.schedule.cancel();
                self.arm_if_live();
            }
            None => {
                self.deadline = None;
                self.remaining_secs = envelope.remaining_secs();
                self.paused = envelope.paused()
                    || self.remaining_secs != minutes_to_secs(self.configured_minutes);
                self.schedule.cancel();
            }
        }
    }

    /// Cancel local scheduling at context shutdown
    pub fn teardown(&mut self) -> bool {
        self.schedule.cancel()
    }

    fn stop_at(&mut self, remaining: i64) {
        self.deadline = None;
        self.paused = false;
        self.remaining_secs = remaining;
        self.schedule.cancel();
    }

    fn arm_if_live(&mut self) -> bool {
        if self.config.keeps_ticking(self.remaining_secs) {
            self.schedule.arm();
            true
        } else {
            false
        }
    }

    fn envelope_at(&self, now: WallTime) -> TimerEnvelope {
        let envelope = match self.deadline {
            Some(deadline) => TimerEnvelope::running_until(
                self.configured_minutes,
                remaining_secs(deadline, now),
                deadline,
                now,
            ),
            None if self.paused => {
                TimerEnvelope::paused_at(self.configured_minutes, self.remaining_secs, now)
            }
            None => TimerEnvelope::stopped(self.configured_minutes, self.remaining_secs, now),
        };
        envelope.with_label(self.label.clone())
    }
}

impl EnvelopeSink for TimerEngine {
    fn replace(&mut self, envelope: &TimerEnvelope) {
        self.adopt(envelope);
    }
}
