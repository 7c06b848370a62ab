//! Context driver - frame loop and notification listener on tokio
//!
//! The driver owns the two background tasks a live context needs: a frame
//! loop that pumps the armed recomputation at the configured cadence, and a
//! listener that applies storage notifications in delivery order.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use syncdown_state::{MemoryStore, MemoryStoreHandle, SharedStore, StoreEvents};
use syncdown_time::Clock;

use crate::{random_context_id, ContextConfig, TimerContext};

/// Lower bound on the frame cadence
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// Background tasks of one context
pub struct ContextDriver<S: SharedStore + 'static> {
    context: Arc<TimerContext<S>>,
    frames: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

impl<S: SharedStore + 'static> ContextDriver<S> {
    /// Spawn the frame loop and the listener. Must run inside a tokio runtime.
    pub fn spawn(
        context: Arc<TimerContext<S>>,
        mut events: StoreEvents,
        frame_interval: Duration,
    ) -> Self {
        let frame_ctx = Arc::clone(&context);
        let frames = tokio::spawn(async move {
            let mut interval = tokio::time::interval(frame_interval.max(MIN_FRAME_INTERVAL));
            // A suspended runtime resumes with one frame, not a burst
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if frame_ctx.is_closed() {
                    break;
                }
                frame_ctx.pump_frame();
            }
            debug!(context = %frame_ctx.id(), "frame loop stopped");
        });

        let listen_ctx = Arc::clone(&context);
        let listener = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if listen_ctx.is_closed() {
                    break;
                }
                listen_ctx.handle_store_event(&event);
            }
            debug!(context = %listen_ctx.id(), "listener stopped");
        });

        info!(context = %context.id(), ?frame_interval, "context driver started");
        ContextDriver {
            context,
            frames: Some(frames),
            listener: Some(listener),
        }
    }

    pub fn context(&self) -> &Arc<TimerContext<S>> {
        &self.context
    }

    /// Tear the context down and wait for both tasks to finish
    pub async fn shutdown(mut self) {
        self.context.teardown();
        for handle in [self.frames.take(), self.listener.take()].into_iter().flatten() {
            handle.abort();
            // Cancellation is the expected outcome here
            let _ = handle.await;
        }
    }
}

impl<S: SharedStore + 'static> Drop for ContextDriver<S> {
    fn drop(&mut self) {
        self.context.teardown();
        for handle in [self.frames.take(), self.listener.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

/// Attach a new context to `store` and start driving it
pub fn launch_memory_context(
    store: &MemoryStore,
    config: &ContextConfig,
    clock: Arc<dyn Clock>,
) -> ContextDriver<MemoryStoreHandle> {
    let id = random_context_id();
    let (handle, events) = store.attach(id);
    let context = Arc::new(TimerContext::open(id, config, handle, clock));
    ContextDriver::spawn(context, events, config.countdown.frame_interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncdown_core::WallTime;
    use syncdown_time::ManualClock;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    fn manual() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(WallTime::from_millis(1_700_000_000_000)))
    }

    #[tokio::test]
    async fn test_listener_applies_remote_writes() {
        let store = MemoryStore::new();
        let clock = manual();
        let config = ContextConfig::default();
        let a = launch_memory_context(&store, &config, clock.clone());
        let b = launch_memory_context(&store, &config, clock.clone());

        a.context().reconfigure(2);
        a.context().start();
        settle().await;

        assert!(b.context().running());
        assert_eq!(b.context().configured_minutes(), 2);
        assert_eq!(b.context().time_left(), 120);

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_frame_loop_publishes_second_changes() {
        let store = MemoryStore::new();
        let clock = manual();
        let config = ContextConfig::default();
        let a = launch_memory_context(&store, &config, clock.clone());
        let b = launch_memory_context(&store, &config, clock.clone());

        a.context().start();
        settle().await;
        let before = a.context().stats().publishes;

        clock.advance(Duration::from_secs(3));
        settle().await;

        // Both contexts derive the same envelope; whichever writes second is silent
        assert_eq!(a.context().stats().publishes, before + 1);
        assert!(b.context().stats().adopted >= 1);
        assert_eq!(b.context().time_left(), 297);
        assert_eq!(b.context().snapshot().deadline(), a.context().snapshot().deadline());

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_listening() {
        let store = MemoryStore::new();
        let clock = manual();
        let config = ContextConfig::default();
        let a = launch_memory_context(&store, &config, clock.clone());
        let b = launch_memory_context(&store, &config, clock.clone());
        let b_ctx = Arc::clone(b.context());

        b.shutdown().await;
        a.context().start();
        settle().await;

        assert!(b_ctx.is_closed());
        assert!(!b_ctx.running());
        assert_eq!(b_ctx.stats().adopted, 0);

        drop(a);
        settle().await;
        assert_eq!(store.listener_count(), 0);
    }
}
