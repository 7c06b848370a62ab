//! End-to-end scenario suite
//!
//! Scenarios that drive real contexts through the simulator and verify the
//! timer's observable guarantees:
//! - Drift-free countdown under late and skipped frames
//! - Idempotent commands and duration coercion
//! - Convergence of every context onto the last write
//! - Overtime behavior and the liveness floor
//! - Containment of malformed data and storage failures

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use syncdown_core::{format_clock, TimerEnvelope, WallTime};
use syncdown_runtime::ContextConfig;
use syncdown_state::Bootstrap;
use syncdown_time::{remaining_secs, CountdownConfig};

use crate::chaos::ChaosConfig;
use crate::simulator::Simulation;

// ============================================================================
// RESULTS
// ============================================================================

/// Outcome of one scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub checks: usize,
    pub violations: Vec<String>,
}

impl ScenarioResult {
    fn new(name: &'static str) -> Self {
        ScenarioResult {
            name,
            checks: 0,
            violations: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    fn check(&mut self, ok: bool, what: impl FnOnce() -> String) {
        self.checks += 1;
        if !ok {
            self.violations.push(what());
        }
    }

    fn check_eq<T: PartialEq + std::fmt::Debug>(&mut self, got: T, want: T, what: &str) {
        self.checks += 1;
        if got != want {
            self.violations.push(format!("{what}: got {got:?}, want {want:?}"));
        }
    }
}

fn per_second() -> ContextConfig {
    ContextConfig {
        countdown: CountdownConfig::per_second(),
        ..ContextConfig::default()
    }
}

fn stored(sim: &Simulation) -> Option<TimerEnvelope> {
    sim.store()
        .peek(&sim.config().storage_key)
        .and_then(|raw| TimerEnvelope::decode(&raw).ok())
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// Remaining time tracks the deadline no matter how frames are delivered
pub fn scenario_drift_freedom(chaos: ChaosConfig, seed: u64) -> ScenarioResult {
    let mut result = ScenarioResult::new("drift_freedom");
    let mut sim = Simulation::new(1, ContextConfig::default(), chaos, seed);
    let mut rng = StdRng::seed_from_u64(seed);

    sim.command(0, |c| c.start());
    let Some(deadline) = sim.context(0).snapshot().deadline() else {
        result.check(false, || "start did not set a deadline".into());
        return result;
    };

    for _ in 0..200 {
        sim.run_for(Duration::from_millis(rng.gen_range(1..1_500)));
        let now = sim.now();
        let ctx = sim.context(0);
        result.check_eq(ctx.snapshot().deadline(), Some(deadline), "deadline moved");
        result.check_eq(ctx.time_left(), remaining_secs(deadline, now), "live remaining");

        if let Some(env) = stored(&sim) {
            let derived = env
                .deadline()
                .map(|d| remaining_secs(d, env.written_at()));
            result.check_eq(Some(env.remaining_secs()), derived, "published remaining");
        }
    }
    result
}

/// Pausing twice is the same as pausing once
pub fn scenario_pause_idempotent() -> ScenarioResult {
    let mut result = ScenarioResult::new("pause_idempotent");
    let mut sim = Simulation::new(2, per_second(), ChaosConfig::none(), 1);

    sim.command(0, |c| c.start());
    sim.run_for(Duration::from_millis(7_300));
    sim.command(0, |c| c.pause());
    let once = sim.context(0).snapshot();
    sim.flush();
    let adoptions = sim.stats().adoptions;

    sim.command(0, |c| c.pause());
    sim.flush();
    result.check_eq(sim.context(0).snapshot(), once, "second pause envelope");
    result.check_eq(sim.stats().adoptions, adoptions, "second pause notified");
    result.check_eq(sim.context(1).time_left(), 293, "replica remaining");
    result.check(!sim.context(0).is_ticking(), || "paused context still ticking".into());
    result
}

/// Encoding then decoding yields the same envelope
pub fn scenario_round_trip(seed: u64) -> ScenarioResult {
    let mut result = ScenarioResult::new("round_trip");
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..500 {
        let minutes = rng.gen_range(1..=999);
        let remaining = rng.gen_range(-7_200..=59_940);
        let written = WallTime::from_millis(rng.gen_range(1_000_000_000_000..4_000_000_000_000));
        let envelope = match rng.gen_range(0..3) {
            0 => {
                let deadline = written.offset_secs(remaining);
                TimerEnvelope::running_until(minutes, remaining, deadline, written)
            }
            1 => TimerEnvelope::paused_at(minutes, remaining, written),
            _ => TimerEnvelope::stopped(minutes, remaining, written),
        };
        let envelope = if rng.gen_bool(0.3) {
            envelope.with_label(Some(format!("room {}", rng.gen_range(1..100u32))))
        } else {
            envelope
        };

        match envelope.encode().and_then(|raw| TimerEnvelope::decode(&raw)) {
            Ok(back) => result.check_eq(back, envelope, "round trip"),
            Err(e) => result.check(false, || format!("codec failed: {e}")),
        }
    }
    result
}

/// After delivery every context reports the same state
pub fn scenario_convergence(contexts: usize, chaos: ChaosConfig, seed: u64) -> ScenarioResult {
    let mut result = ScenarioResult::new("convergence");
    let mut sim = Simulation::new(contexts, per_second(), chaos, seed);
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);

    for round in 0..40 {
        let actor = rng.gen_range(0..sim.len());
        match rng.gen_range(0..5) {
            0 | 1 => sim.command(actor, |c| c.start()),
            2 => sim.command(actor, |c| c.pause()),
            3 => sim.command(actor, |c| c.reset()),
            _ => {
                let minutes = rng.gen_range(-2..30);
                sim.command(actor, |c| c.reconfigure(minutes));
            }
        }
        sim.run_for(Duration::from_secs(3));
        result.check(sim.converged(), || {
            format!("round {round}: diverged, time_left {:?}", sim.time_lefts())
        });
    }
    result
}

/// Coercion of the configured duration
pub fn scenario_reconfigure() -> ScenarioResult {
    let mut result = ScenarioResult::new("reconfigure");
    let mut sim = Simulation::new(2, per_second(), ChaosConfig::none(), 1);

    sim.command(0, |c| c.reconfigure(0));
    let zero = sim.context(0).snapshot();
    sim.command(0, |c| c.reconfigure(1));
    result.check_eq(sim.context(0).snapshot(), zero, "reconfigure(0) vs reconfigure(1)");

    sim.command(0, |c| c.start());
    sim.run_for(Duration::from_secs(12));
    sim.command(1, |c| c.reconfigure(10));
    sim.flush();
    for i in 0..sim.len() {
        let ctx = sim.context(i);
        result.check(!ctx.running(), || format!("context {i} still running"));
        result.check_eq(ctx.time_left(), 600, "remaining after reconfigure(10)");
        result.check(!ctx.is_ticking(), || format!("context {i} still ticking"));
    }
    result
}

/// Clock-face formatting
pub fn scenario_clock_format() -> ScenarioResult {
    let mut result = ScenarioResult::new("clock_format");
    for (secs, want) in [
        (0, "00:00"),
        (-1, "-00:01"),
        (599, "09:59"),
        (3600, "60:00"),
        (-3600, "-60:00"),
    ] {
        result.check_eq(format_clock(secs).as_str(), want, "format");
    }
    result
}

/// Ticks stop at the floor but the live value keeps counting
pub fn scenario_overtime_floor() -> ScenarioResult {
    let mut result = ScenarioResult::new("overtime_floor");
    let mut sim = Simulation::new(1, per_second(), ChaosConfig::none(), 1);
    let floor = sim.config().countdown.overtime_floor_secs;

    sim.command(0, |c| c.reconfigure(1));
    sim.command(0, |c| c.start());
    sim.run_for(Duration::from_secs(60 + 3_605));

    let ctx = sim.context(0);
    result.check(!ctx.is_ticking(), || "tick armed below the floor".into());
    result.check(ctx.running(), || "overtime stopped the timer".into());
    result.check_eq(ctx.time_left(), -3_605, "live overtime");
    result.check_eq(
        stored(&sim).map(|e| e.remaining_secs()),
        Some(floor),
        "last published remaining",
    );

    sim.run_for(Duration::from_secs(10));
    result.check_eq(sim.context(0).time_left(), -3_615, "overtime after parking");
    result
}

/// One-minute timer overrun by one second
pub fn scenario_one_minute_overrun() -> ScenarioResult {
    let mut result = ScenarioResult::new("one_minute_overrun");
    let mut sim = Simulation::new(2, ContextConfig::default(), ChaosConfig::good(), 3);
    let t0 = sim.now();

    sim.command(0, |c| c.reconfigure(1));
    sim.command(0, |c| c.start());
    result.check_eq(
        sim.context(0).snapshot().deadline(),
        Some(t0 + Duration::from_secs(60)),
        "deadline",
    );

    sim.run_for(Duration::from_secs(61));
    for i in 0..sim.len() {
        let ctx = sim.context(i);
        result.check_eq(ctx.time_left(), -1, "remaining at T0+61s");
        result.check_eq(ctx.display().as_str(), "-00:01", "display at T0+61s");
    }
    result
}

/// Malformed data and storage failures stay contained
pub fn scenario_fault_containment() -> ScenarioResult {
    let mut result = ScenarioResult::new("fault_containment");
    let mut sim = Simulation::new(3, per_second(), ChaosConfig::none(), 1);
    let key = sim.config().storage_key.clone();

    // Opening contexts never writes
    result.check_eq(sim.store().peek(&key), None, "bootstrap wrote");
    sim.command(0, |c| c.reconfigure(4));
    sim.flush();
    let before = sim.store().peek(&key);
    let delivered = sim.stats().notifications_delivered;
    let late = sim.open_context();
    sim.flush();
    result.check_eq(sim.context(late).bootstrap_outcome(), Bootstrap::Adopted, "late bootstrap");
    result.check_eq(sim.store().peek(&key), before, "late joiner wrote");
    result.check_eq(sim.stats().notifications_delivered, delivered, "late joiner notified");

    // Malformed notifications change nothing
    sim.store().write_external(&key, "{\"running\":\"maybe\"");
    sim.flush();
    for i in 0..sim.len() {
        result.check_eq(sim.context(i).time_left(), 240, "after malformed write");
    }
    let recovered = sim.open_context();
    result.check_eq(
        sim.context(recovered).bootstrap_outcome(),
        Bootstrap::Recovered,
        "bootstrap over garbage",
    );

    // Publish failures leave the local countdown intact
    sim.set_storage_available(false);
    sim.command(1, |c| c.start());
    sim.run_for(Duration::from_secs(5));
    result.check_eq(sim.context(1).time_left(), 235, "local countdown during outage");
    result.check(sim.context(1).stats().publish_failures > 0, || "no failure recorded".into());
    result.check(!sim.context(0).running(), || "outage write leaked".into());

    sim.set_storage_available(true);
    sim.run_for(Duration::from_secs(2));
    sim.flush();
    result.check_eq(sim.context(0).time_left(), 233, "replica after recovery");
    result
}

/// Run every scenario with default parameters
pub fn run_all() -> Vec<ScenarioResult> {
    vec![
        scenario_drift_freedom(ChaosConfig::hostile(), 42),
        scenario_pause_idempotent(),
        scenario_round_trip(42),
        scenario_convergence(4, ChaosConfig::good(), 42),
        scenario_reconfigure(),
        scenario_clock_format(),
        scenario_overtime_floor(),
        scenario_one_minute_overrun(),
        scenario_fault_containment(),
    ]
}
