//! Chaos model for notification delivery and frame scheduling
//!
//! Simulates hostile host conditions:
//! - Notification latency and jitter
//! - Late frames
//! - Skipped frames (throttled or suspended tabs)

use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Jitter distribution type
#[derive(Clone, Debug)]
pub enum JitterDistribution {
    /// No jitter
    None,
    /// Uniform distribution
    Uniform { min_ms: u32, max_ms: u32 },
    /// Pareto distribution (heavy tail)
    Pareto { scale_ms: f64, shape: f64 },
}

impl JitterDistribution {
    /// Sample a jitter value
    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        match self {
            JitterDistribution::None => Duration::ZERO,
            JitterDistribution::Uniform { min_ms, max_ms } => {
                if max_ms <= min_ms {
                    return Duration::from_millis(u64::from(*min_ms));
                }
                let dist = Uniform::new(*min_ms, *max_ms);
                Duration::from_millis(u64::from(dist.sample(rng)))
            }
            JitterDistribution::Pareto { scale_ms, shape } => {
                let u: f64 = rng.gen_range(f64::EPSILON..1.0);
                let value = scale_ms / u.powf(1.0 / shape);
                Duration::from_millis(value.min(5_000.0) as u64) // Cap at 5 seconds
            }
        }
    }
}

/// Host chaos configuration
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Base notification latency
    pub base_latency: Duration,
    /// Notification jitter
    pub jitter: JitterDistribution,
    /// Extra delay added to each frame (late animation frames)
    pub frame_jitter: JitterDistribution,
    /// Probability a frame is skipped entirely (0.0 - 1.0)
    pub skip_frame_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(5),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 20,
            },
            frame_jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 8,
            },
            skip_frame_prob: 0.05,
        }
    }
}

impl ChaosConfig {
    /// Instant delivery and exact frames
    pub fn none() -> Self {
        ChaosConfig {
            base_latency: Duration::ZERO,
            jitter: JitterDistribution::None,
            frame_jitter: JitterDistribution::None,
            skip_frame_prob: 0.0,
        }
    }

    /// Foreground tabs on an idle machine
    pub fn good() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(1),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 4,
            },
            frame_jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 2,
            },
            skip_frame_prob: 0.0,
        }
    }

    /// Background tabs with throttled timers
    pub fn poor() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(50),
            jitter: JitterDistribution::Pareto {
                scale_ms: 20.0,
                shape: 1.5,
            },
            frame_jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 200,
            },
            skip_frame_prob: 0.3,
        }
    }

    /// Suspended tabs: most frames never run
    pub fn hostile() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(200),
            jitter: JitterDistribution::Pareto {
                scale_ms: 100.0,
                shape: 1.2,
            },
            frame_jitter: JitterDistribution::Pareto {
                scale_ms: 50.0,
                shape: 1.1,
            },
            skip_frame_prob: 0.8,
        }
    }
}

/// Seeded sampler over a [`ChaosConfig`]
pub struct DeliveryModel {
    config: ChaosConfig,
    rng: StdRng,
    stats: ChaosStats,
}

/// Chaos statistics
#[derive(Clone, Debug, Default)]
pub struct ChaosStats {
    pub notifications_delayed: u64,
    pub total_latency_ms: u64,
    pub max_latency_ms: u64,
    pub frames_skipped: u64,
    pub frames_run: u64,
}

impl ChaosStats {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.notifications_delayed == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.notifications_delayed as f64
        }
    }

    pub fn skip_rate(&self) -> f64 {
        let total = self.frames_run + self.frames_skipped;
        if total == 0 {
            0.0
        } else {
            self.frames_skipped as f64 / total as f64
        }
    }
}

impl DeliveryModel {
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        DeliveryModel {
            config,
            rng: StdRng::seed_from_u64(seed),
            stats: ChaosStats::default(),
        }
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    /// Latency of one notification
    pub fn notification_delay(&mut self) -> Duration {
        let delay = self.config.base_latency + self.config.jitter.sample(&mut self.rng);
        let ms = delay.as_millis() as u64;
        self.stats.notifications_delayed += 1;
        self.stats.total_latency_ms += ms;
        self.stats.max_latency_ms = self.stats.max_latency_ms.max(ms);
        delay
    }

    /// Time until the next frame given the nominal cadence
    pub fn frame_delay(&mut self, cadence: Duration) -> Duration {
        cadence + self.config.frame_jitter.sample(&mut self.rng)
    }

    /// Whether this frame should be dropped
    pub fn skip_frame(&mut self) -> bool {
        let skip = self.config.skip_frame_prob > 0.0
            && self.rng.gen::<f64>() < self.config.skip_frame_prob;
        if skip {
            self.stats.frames_skipped += 1;
        } else {
            self.stats.frames_run += 1;
        }
        skip
    }

    /// Uniform index in `0..len` for picking actors
    pub fn pick(&mut self, len: usize) -> usize {
        if len <= 1 {
            0
        } else {
            self.rng.gen_range(0..len)
        }
    }

    /// Bernoulli draw
    pub fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.gen::<f64>() < p
    }
}
