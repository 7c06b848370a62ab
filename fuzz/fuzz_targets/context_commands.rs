#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use syncdown_core::{ContextId, WallTime};
use syncdown_runtime::{ContextConfig, TimerContext};
use syncdown_state::MemoryStore;
use syncdown_time::{remaining_secs, Clock, ManualClock};

#[derive(Arbitrary, Debug)]
enum Op {
    Start,
    Pause,
    Reset,
    Reconfigure(i64),
    Input(String),
    Advance(u16),
    Frame,
    Remote(String),
}

fuzz_target!(|ops: Vec<Op>| {
    let store = MemoryStore::new();
    let clock = Arc::new(ManualClock::new(WallTime::from_millis(1_700_000_000_000)));
    let (handle, _events) = store.attach(ContextId::new(1));
    let ctx = TimerContext::open(ContextId::new(1), &ContextConfig::default(), handle, clock.clone());

    for op in ops {
        match op {
            Op::Start => ctx.start(),
            Op::Pause => ctx.pause(),
            Op::Reset => ctx.reset(),
            Op::Reconfigure(m) => ctx.reconfigure(m),
            Op::Input(s) => ctx.reconfigure_input(&s),
            Op::Advance(ms) => {
                clock.advance_millis(i64::from(ms));
            }
            Op::Frame => {
                ctx.pump_frame();
            }
            Op::Remote(raw) => {
                ctx.handle_remote_change(&raw);
            }
        }

        let snapshot = ctx.snapshot();
        assert!((1..=999).contains(&ctx.configured_minutes()));
        match snapshot.deadline() {
            Some(deadline) => {
                assert_eq!(ctx.time_left(), remaining_secs(deadline, clock.now()));
            }
            None => assert!(!ctx.is_ticking()),
        }
    }
});
