//! Deadline-based countdown arithmetic and cadence configuration
//!
//! Remaining time is always `round((deadline - now) / 1000)`. Nothing in the
//! countdown path ever decrements a counter, so late or skipped ticks are
//! absorbed by the next recomputation instead of accumulating.

use std::time::Duration;

use syncdown_core::WallTime;

/// One hour past zero: the live loop stops rescheduling at or below this
pub const OVERTIME_FLOOR_SECS: i64 = -3600;

/// Whole seconds from `now` until `deadline`, negative once it has passed.
///
/// Half seconds round toward positive infinity: 0.5 s left reads 1,
/// 0.5 s over reads 0, 1.5 s over reads -1.
#[inline]
pub fn remaining_secs(deadline: WallTime, now: WallTime) -> i64 {
    deadline
        .millis_since(now)
        .saturating_add(500)
        .div_euclid(1000)
}

/// Deadline `secs` whole seconds after `now`
#[inline]
pub fn deadline_after(now: WallTime, secs: i64) -> WallTime {
    now.offset_secs(secs)
}

/// Countdown cadence configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountdownConfig {
    /// Interval between recomputations
    pub frame_interval: Duration,
    /// Liveness floor; ticks stop re-arming once remaining is at or below it
    pub overtime_floor_secs: i64,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        // Roughly one animation frame at 60 Hz
        CountdownConfig {
            frame_interval: Duration::from_millis(16),
            overtime_floor_secs: OVERTIME_FLOOR_SECS,
        }
    }
}

impl CountdownConfig {
    /// One recomputation per second
    pub fn per_second() -> Self {
        CountdownConfig {
            frame_interval: Duration::from_secs(1),
            ..Self::default()
        }
    }

    /// Background/battery-friendly cadence
    pub fn low_power() -> Self {
        CountdownConfig {
            frame_interval: Duration::from_millis(250),
            ..Self::default()
        }
    }

    /// Whether a tick that derived `remaining` should schedule another
    #[inline]
    pub fn keeps_ticking(&self, remaining: i64) -> bool {
        remaining > self.overtime_floor_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_remaining_secs_rounding() {
        let deadline = WallTime::from_millis(60_000);
        assert_eq!(remaining_secs(deadline, WallTime::from_millis(0)), 60);
        assert_eq!(remaining_secs(deadline, WallTime::from_millis(59_500)), 1);
        assert_eq!(remaining_secs(deadline, WallTime::from_millis(59_501)), 0);
        assert_eq!(remaining_secs(deadline, WallTime::from_millis(60_500)), 0);
        assert_eq!(remaining_secs(deadline, WallTime::from_millis(60_501)), -1);
        assert_eq!(remaining_secs(deadline, WallTime::from_millis(61_500)), -1);
        assert_eq!(remaining_secs(deadline, WallTime::from_millis(61_000)), -1);
    }

    #[test]
    fn test_deadline_after() {
        let now = WallTime::from_millis(1_000);
        assert_eq!(deadline_after(now, 60), WallTime::from_millis(61_000));
        assert_eq!(remaining_secs(deadline_after(now, 60), now), 60);
    }

    #[test]
    fn test_keeps_ticking_floor() {
        let cfg = CountdownConfig::default();
        assert!(cfg.keeps_ticking(0));
        assert!(cfg.keeps_ticking(-3599));
        assert!(!cfg.keeps_ticking(-3600));
        assert!(!cfg.keeps_ticking(-5000));
    }

    #[test]
    fn test_presets() {
        assert_eq!(CountdownConfig::per_second().frame_interval, Duration::from_secs(1));
        assert_eq!(CountdownConfig::low_power().overtime_floor_secs, OVERTIME_FLOOR_SECS);
    }

    proptest! {
        #[test]
        fn test_remaining_matches_float_rounding(deadline in -10_000_000i64..10_000_000, now in -10_000_000i64..10_000_000) {
            let expected = ((deadline - now) as f64 / 1000.0 + 0.5).floor() as i64;
            prop_assert_eq!(
                remaining_secs(WallTime::from_millis(deadline), WallTime::from_millis(now)),
                expected
            );
        }
    }
}
