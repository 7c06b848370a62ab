//! Cancellable tick scheduling
//!
//! A scheduler (animation-frame loop, tokio interval, simulation queue) is
//! handed a [`TickToken`] when a tick is armed. Cancelling drops the armed
//! token, so a callback already in flight when the timer paused presents a
//! stale token and is refused.

/// Handle for one armed recomputation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickToken(u64);

impl TickToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Single-slot tick schedule owned by one engine
#[derive(Debug, Default)]
pub struct TickSchedule {
    generation: u64,
    armed: Option<TickToken>,
}

impl TickSchedule {
    pub fn new() -> Self {
        TickSchedule::default()
    }

    /// Arm the next tick, replacing any previously armed one
    pub fn arm(&mut self) -> TickToken {
        self.generation += 1;
        let token = TickToken(self.generation);
        self.armed = Some(token);
        token
    }

    /// Cancel the armed tick. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Currently armed token, if any
    pub fn pending(&self) -> Option<TickToken> {
        self.armed
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Consume the armed token. Stale or cancelled tokens are refused.
    pub fn fire(&mut self, token: TickToken) -> bool {
        if self.armed == Some(token) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}
