//! Two live contexts on the system clock, driven by tokio

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use syncdown_runtime::{launch_memory_context, ContextConfig, TimerPhase};
use syncdown_state::MemoryStore;
use syncdown_time::{CountdownConfig, SystemClock};

fn config() -> ContextConfig {
    ContextConfig {
        storage_key: "two-contexts".into(),
        countdown: CountdownConfig {
            frame_interval: Duration::from_millis(10),
            ..CountdownConfig::default()
        },
        ..ContextConfig::default()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_pause_reset_converge() {
    let store = MemoryStore::new();
    let clock = Arc::new(SystemClock::new());
    let a = launch_memory_context(&store, &config(), clock.clone());
    let b = launch_memory_context(&store, &config(), clock.clone());

    let adopted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&adopted);
    b.context().subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    a.context().reconfigure(1);
    a.context().start();
    settle().await;

    assert!(b.context().running());
    assert_eq!(b.context().snapshot().deadline(), a.context().snapshot().deadline());
    let left = b.context().time_left();
    assert!((59..=60).contains(&left), "time_left {left}");
    assert!(adopted.load(Ordering::SeqCst) >= 2);

    b.context().pause();
    settle().await;
    assert!(!a.context().running());
    assert_eq!(a.context().time_left(), b.context().time_left());
    assert_eq!(a.context().phase(), TimerPhase::Paused);

    a.context().reset();
    settle().await;
    assert_eq!(b.context().time_left(), 60);
    assert_eq!(b.context().phase(), TimerPhase::Idle);

    a.shutdown().await;
    b.shutdown().await;
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_late_joiner_sees_running_timer() {
    let store = MemoryStore::new();
    let clock = Arc::new(SystemClock::new());
    let a = launch_memory_context(&store, &config(), clock.clone());
    a.context().start();
    settle().await;

    let late = launch_memory_context(&store, &config(), clock.clone());
    assert!(late.context().running());
    assert_eq!(late.context().time_left(), a.context().time_left());
    assert!(late.context().is_ticking());

    drop(late);
    a.shutdown().await;
}
