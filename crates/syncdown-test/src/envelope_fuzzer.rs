//! Envelope Fuzzer - hostile payloads against a live context
//!
//! Tests:
//! - Malformed payloads never change state
//! - Valid payloads (current and legacy key spellings) are adopted wholesale
//! - Running payloads are re-derived from their deadline, not their count

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use syncdown_core::{TimerEnvelope, WallTime, MAX_CONFIGURED_MINUTES};
use syncdown_runtime::TimerContext;
use syncdown_state::SharedStore;
use syncdown_time::remaining_secs;

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of payloads to generate
    pub cases: usize,
    /// Probability a payload is malformed (0.0 - 1.0)
    pub malformed_prob: f64,
    /// Probability a valid payload uses the legacy key spelling
    pub legacy_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            cases: 500,
            malformed_prob: 0.5,
            legacy_prob: 0.2,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            cases: 100,
            ..Default::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            cases: 10_000,
            malformed_prob: 0.7,
            ..Default::default()
        }
    }
}

/// A generated payload and whether it must decode
#[derive(Clone, Debug)]
pub struct FuzzPayload {
    pub raw: String,
    pub valid: bool,
}

/// Fuzz run results
#[derive(Clone, Debug, Default)]
pub struct FuzzReport {
    pub cases: usize,
    pub malformed: usize,
    pub adopted: usize,
    pub violations: Vec<String>,
}

impl FuzzReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Envelope fuzzer
pub struct EnvelopeFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
}

impl EnvelopeFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        EnvelopeFuzzer { config, rng }
    }

    /// Generate one payload
    pub fn next_payload(&mut self, now: WallTime) -> FuzzPayload {
        if self.rng.gen::<f64>() < self.config.malformed_prob {
            FuzzPayload {
                raw: self.malformed(now),
                valid: false,
            }
        } else {
            FuzzPayload {
                raw: self.valid(now),
                valid: true,
            }
        }
    }

    /// Feed every payload to `context`, checking the adoption contract
    pub fn run<S: SharedStore>(&mut self, context: &TimerContext<S>, now: WallTime) -> FuzzReport {
        let mut report = FuzzReport::default();

        for case in 0..self.config.cases {
            let payload = self.next_payload(now);
            let before = context.snapshot();
            let before_left = context.time_left();
            let adopted = context.handle_remote_change(&payload.raw);

            report.cases += 1;
            if !payload.valid {
                report.malformed += 1;
                let after = context.snapshot();
                if adopted
                    || after.running() != before.running()
                    || after.deadline() != before.deadline()
                    || after.configured_minutes() != before.configured_minutes()
                    || context.time_left() != before_left
                {
                    report
                        .violations
                        .push(format!("case {case}: malformed payload changed state: {}", payload.raw));
                }
                continue;
            }

            if !adopted {
                report
                    .violations
                    .push(format!("case {case}: valid payload rejected: {}", payload.raw));
                continue;
            }
            report.adopted += 1;

            let expected = match TimerEnvelope::decode(&payload.raw) {
                Ok(envelope) => envelope,
                Err(e) => {
                    report.violations.push(format!("case {case}: {e}"));
                    continue;
                }
            };
            let want_left = match expected.deadline() {
                Some(deadline) => remaining_secs(deadline, now),
                None => expected.remaining_secs(),
            };
            if context.running() != expected.running()
                || context.configured_minutes() != expected.configured_minutes()
                || context.time_left() != want_left
            {
                report.violations.push(format!(
                    "case {case}: adopted state differs (running {}, minutes {}, left {} vs {want_left}): {}",
                    context.running(),
                    context.configured_minutes(),
                    context.time_left(),
                    payload.raw
                ));
            }
        }

        report
    }

    fn valid(&mut self, now: WallTime) -> String {
        let minutes = self.rng.gen_range(1..=MAX_CONFIGURED_MINUTES);
        let remaining = self.rng.gen_range(-3_600..=i64::from(minutes) * 60);
        let running = self.rng.gen_bool(0.5);
        let deadline = now.as_millis() + self.rng.gen_range(-3_600_000..=3_600_000);
        let written = now.as_millis() - self.rng.gen_range(0..10_000);

        if self.rng.gen::<f64>() < self.config.legacy_prob {
            return format!(
                r#"{{"timeLeft":{remaining},"initialTime":{minutes},"isRunning":{running},"targetTime":{},"lastUpdate":{written},"townName":"Oslo"}}"#,
                if running { deadline.to_string() } else { "null".to_string() }
            );
        }

        let envelope = if running {
            TimerEnvelope::running_until(minutes, remaining, WallTime::from_millis(deadline), WallTime::from_millis(written))
        } else if self.rng.gen_bool(0.5) {
            TimerEnvelope::paused_at(minutes, remaining, WallTime::from_millis(written))
        } else {
            TimerEnvelope::stopped(minutes, remaining, WallTime::from_millis(written))
        };
        let mut raw = envelope
            .encode()
            .unwrap_or_else(|_| "{}".to_string());
        if self.rng.gen_bool(0.2) {
            // Fields from a newer writer must be tolerated
            raw = raw.replacen('{', r#"{"theme":"dark","volume":0.5,"#, 1);
        }
        raw
    }

    fn malformed(&mut self, now: WallTime) -> String {
        match self.rng.gen_range(0..6) {
            0 => {
                // Truncated object: no proper prefix of an object parses
                let full = self.valid(now);
                let cut = self.rng.gen_range(0..full.len());
                full[..cut].to_string()
            }
            1 => {
                let len = self.rng.gen_range(1..40);
                (&mut self.rng)
                    .sample_iter(&Alphanumeric)
                    .take(len)
                    .map(char::from)
                    .collect()
            }
            2 => r#"{"remainingSeconds":"soon","running":false}"#.to_string(),
            3 => r#"{"running":"yes","deadline":1}"#.to_string(),
            4 => format!(r#"{{"running":true,"deadline":{}.5}}"#, now.as_millis()),
            _ => match self.rng.gen_range(0..3) {
                0 => "null".to_string(),
                1 => "true".to_string(),
                _ => r#""timer""#.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use syncdown_core::ContextId;
    use syncdown_runtime::ContextConfig;
    use syncdown_state::MemoryStore;
    use syncdown_time::ManualClock;

    const NOW: WallTime = WallTime(1_700_000_000_000);

    fn context() -> TimerContext<syncdown_state::MemoryStoreHandle> {
        let store = MemoryStore::new();
        let (handle, _events) = store.attach(ContextId::new(1));
        TimerContext::open(
            ContextId::new(1),
            &ContextConfig::default(),
            handle,
            Arc::new(ManualClock::new(NOW)),
        )
    }

    #[test]
    fn test_payloads_are_classified_correctly() {
        let mut fuzzer = EnvelopeFuzzer::new(FuzzerConfig::light());
        for _ in 0..500 {
            let payload = fuzzer.next_payload(NOW);
            assert_eq!(
                TimerEnvelope::decode(&payload.raw).is_ok(),
                payload.valid,
                "{}",
                payload.raw
            );
        }
    }

    #[test]
    fn test_light_fuzz_passes() {
        let ctx = context();
        let report = EnvelopeFuzzer::new(FuzzerConfig::light()).run(&ctx, NOW);
        assert!(report.passed(), "{:?}", report.violations);
        assert_eq!(report.cases, 100);
        assert!(report.malformed > 0);
        assert!(report.adopted > 0);
        assert_eq!(report.malformed + report.adopted, report.cases);
    }

    #[test]
    fn test_all_malformed_keeps_defaults() {
        let ctx = context();
        let config = FuzzerConfig {
            cases: 300,
            malformed_prob: 1.0,
            ..Default::default()
        };
        let report = EnvelopeFuzzer::new(config).run(&ctx, NOW);
        assert!(report.passed(), "{:?}", report.violations);
        assert_eq!(ctx.time_left(), 300);
        assert!(!ctx.running());
        assert_eq!(ctx.stats().rejected, 300);
    }
}
