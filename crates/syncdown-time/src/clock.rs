//! Clock implementations

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use syncdown_core::WallTime;

/// Source of "now" in the shared wall-clock domain.
///
/// Deadlines written by one context are compared against another context's
/// clock, so every implementation must report Unix-epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> WallTime;
}

/// Operating system wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        SystemClock
    }
}

impl Clock for SystemClock {
    fn now(&self) -> WallTime {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => WallTime::from_millis(since.as_millis() as i64),
            // System clock set before 1970
            Err(e) => WallTime::from_millis(-(e.duration().as_millis() as i64)),
        }
    }
}

/// Manually driven clock for simulations and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: WallTime) -> Self {
        ManualClock {
            millis: AtomicI64::new(start.as_millis()),
        }
    }

    /// Move forward by `dt`
    pub fn advance(&self, dt: Duration) -> WallTime {
        self.advance_millis(dt.as_millis() as i64)
    }

    /// Move by a signed number of milliseconds
    pub fn advance_millis(&self, millis: i64) -> WallTime {
        let prev = self.millis.fetch_add(millis, Ordering::SeqCst);
        WallTime::from_millis(prev + millis)
    }

    /// Jump to an absolute time (may go backwards, like a user adjusting the OS clock)
    pub fn set(&self, t: WallTime) {
        self.millis.store(t.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> WallTime {
        WallTime::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_epoch_based() {
        let now = SystemClock::new().now();
        // Later than 2020-01-01
        assert!(now.as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(WallTime::from_millis(1_000));
        assert_eq!(clock.now().as_millis(), 1_000);

        let t = clock.advance(Duration::from_millis(250));
        assert_eq!(t.as_millis(), 1_250);
        assert_eq!(clock.now(), t);

        clock.advance_millis(-50);
        assert_eq!(clock.now().as_millis(), 1_200);

        clock.set(WallTime::from_millis(5));
        assert_eq!(clock.now().as_millis(), 5);
    }

    #[test]
    fn test_clock_as_trait_object() {
        let clock: std::sync::Arc<dyn Clock> = std::sync::Arc::new(ManualClock::new(WallTime::ZERO));
        assert_eq!(clock.now(), WallTime::ZERO);
    }
}
