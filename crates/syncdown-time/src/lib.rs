//! syncdown Time - clocks and countdown control
//!
//! This crate implements the time side of the timer engine:
//! - Clock abstraction over the shared wall-clock domain
//! - Deadline arithmetic (remaining seconds are derived, never decremented)
//! - Countdown cadence and the overtime liveness floor
//! - Cancellable, generation-tagged tick scheduling

pub mod clock;
pub mod countdown;
pub mod schedule;

pub use clock::*;
pub use countdown::*;
pub use schedule::*;
