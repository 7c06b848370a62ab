//! Time primitives for syncdown
//!
//! Every context shares one clock domain: milliseconds since the Unix epoch.
//! Deadlines written by one context are interpreted against the local clock
//! of every other context, so nothing here is relative to process start.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Wall-clock instant in milliseconds since the Unix epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WallTime(pub i64);

impl WallTime {
    pub const ZERO: WallTime = WallTime(0);
    pub const MAX: WallTime = WallTime(i64::MAX);
    pub const MIN: WallTime = WallTime(i64::MIN);

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        WallTime(millis)
    }

    #[inline]
    pub fn from_secs(secs: i64) -> Self {
        WallTime(secs.saturating_mul(1000))
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Signed distance `self - earlier` in milliseconds
    #[inline]
    pub fn millis_since(self, earlier: WallTime) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Shift by a signed number of whole seconds
    #[inline]
    pub fn offset_secs(self, secs: i64) -> Self {
        WallTime(self.0.saturating_add(secs.saturating_mul(1000)))
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        WallTime(self.0.saturating_add(duration_millis(duration)))
    }

    #[inline]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        WallTime(self.0.saturating_sub(duration_millis(duration)))
    }
}

#[inline]
fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl Add<Duration> for WallTime {
    type Output = WallTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Duration> for WallTime {
    type Output = WallTime;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Sub<WallTime> for WallTime {
    type Output = Duration;

    /// Unsigned elapsed time, zero if `rhs` is later
    #[inline]
    fn sub(self, rhs: WallTime) -> Self::Output {
        let diff = self.millis_since(rhs);
        if diff >= 0 {
            Duration::from_millis(diff as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl std::fmt::Debug for WallTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wall({}ms)", self.0)
    }
}
