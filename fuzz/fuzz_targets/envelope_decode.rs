#![no_main]

use libfuzzer_sys::fuzz_target;
use syncdown_core::TimerEnvelope;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(envelope) = TimerEnvelope::decode(raw) else {
        return;
    };

    assert!(envelope.configured_minutes() >= 1);
    assert_eq!(envelope.running(), envelope.deadline().is_some());
    assert!(envelope.deadline().map_or(true, |d| d.as_millis() > 0));
    assert!(!(envelope.running() && envelope.paused()));

    let encoded = envelope.encode().expect("decoded envelope must encode");
    let back = TimerEnvelope::decode(&encoded).expect("encoded envelope must decode");
    assert_eq!(back, envelope);
});
