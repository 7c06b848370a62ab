//! Replication channel - publish local envelopes, adopt remote ones
//!
//! The channel is the only code that touches the shared storage key. Writes
//! are fire-and-forget and never retried; the next state change republishes
//! the whole (newer) envelope anyway. Incoming payloads that fail to decode
//! are dropped so malformed data never reaches the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use syncdown_core::{ContextId, SyncdownResult, TimerEnvelope};

use crate::{SharedStore, StoreEvent};

/// Receiver of an adopted envelope; the timer engine implements this
pub trait EnvelopeSink {
    /// Replace local state wholesale with `envelope`
    fn replace(&mut self, envelope: &TimerEnvelope);
}

/// Handle returned by [`ReplicationChannel::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&TimerEnvelope) + Send + Sync>;

/// How a context obtained its initial state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bootstrap {
    /// Nothing persisted; started from defaults
    Fresh,
    /// Adopted the persisted envelope
    Adopted,
    /// Persisted value was unreadable; started from defaults
    Recovered,
}

/// Channel counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub publishes: u64,
    pub publish_failures: u64,
    pub adopted: u64,
    pub rejected: u64,
}

/// Replication channel for one context
pub struct ReplicationChannel<S> {
    context: ContextId,
    key: String,
    store: S,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
    stats: Mutex<ChannelStats>,
}

impl<S: SharedStore> ReplicationChannel<S> {
    pub fn new(context: ContextId, key: impl Into<String>, store: S) -> Self {
        ReplicationChannel {
            context,
            key: key.into(),
            store,
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            stats: Mutex::new(ChannelStats::default()),
        }
    }

    /// Storage key this channel replicates through
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats.lock().clone()
    }

    /// Write the envelope to shared storage.
    ///
    /// Failures are counted and logged here; callers treat the result as
    /// advisory and keep running locally.
    pub fn publish(&self, envelope: &TimerEnvelope) -> SyncdownResult<()> {
        let result = envelope
            .encode()
            .and_then(|raw| self.store.put(&self.key, &raw));

        let mut stats = self.stats.lock();
        match &result {
            Ok(()) => {
                stats.publishes += 1;
                debug!(
                    context = %self.context,
                    key = %self.key,
                    running = envelope.running(),
                    remaining = envelope.remaining_secs(),
                    "published envelope"
                );
            }
            Err(e) => {
                stats.publish_failures += 1;
                warn!(context = %self.context, key = %self.key, error = %e, "publish failed");
            }
        }
        result
    }

    /// Read the shared key once at startup and seed `sink`.
    ///
    /// `defaults` seeds the sink when nothing usable is persisted. Never
    /// writes: a fresh context stays silent so opening a tab does not fan a
    /// write out to every other tab.
    pub fn bootstrap<K: EnvelopeSink + ?Sized>(
        &self,
        sink: &mut K,
        defaults: TimerEnvelope,
    ) -> Bootstrap {
        let raw = match self.store.get(&self.key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(context = %self.context, key = %self.key, error = %e, "storage read failed at startup");
                None
            }
        };

        let outcome = match raw {
            None => {
                sink.replace(&defaults);
                Bootstrap::Fresh
            }
            Some(raw) => match TimerEnvelope::decode(&raw) {
                Ok(envelope) => {
                    sink.replace(&envelope);
                    Bootstrap::Adopted
                }
                Err(e) => {
                    warn!(context = %self.context, key = %self.key, error = %e, "ignoring unreadable persisted state");
                    self.stats.lock().rejected += 1;
                    sink.replace(&defaults);
                    Bootstrap::Recovered
                }
            },
        };
        info!(context = %self.context, key = %self.key, ?outcome, "bootstrapped");
        outcome
    }

    /// Handle a raw payload written by another context.
    ///
    /// On success the sink is replaced and then every subscriber runs.
    /// On decode failure nothing changes and `None` is returned.
    pub fn on_remote_change<K: EnvelopeSink + ?Sized>(
        &self,
        raw: &str,
        sink: &mut K,
    ) -> Option<TimerEnvelope> {
        let envelope = match TimerEnvelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(context = %self.context, key = %self.key, error = %e, "dropping malformed remote change");
                self.stats.lock().rejected += 1;
                return None;
            }
        };

        sink.replace(&envelope);
        self.stats.lock().adopted += 1;
        debug!(
            context = %self.context,
            running = envelope.running(),
            remaining = envelope.remaining_secs(),
            "adopted remote envelope"
        );

        self.notify(&envelope);
        Some(envelope)
    }

    /// Route a storage notification; other keys and removals are ignored
    pub fn on_store_event<K: EnvelopeSink + ?Sized>(
        &self,
        event: &StoreEvent,
        sink: &mut K,
    ) -> Option<TimerEnvelope> {
        if event.key != self.key {
            return None;
        }
        let raw = event.new_value.as_deref()?;
        self.on_remote_change(raw, sink)
    }

    /// Register a callback run after every remote replacement
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TimerEnvelope) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn notify(&self, envelope: &TimerEnvelope) {
        // Snapshot so callbacks may subscribe/unsubscribe without deadlocking
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in subscribers {
            callback(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use std::sync::atomic::AtomicUsize;
    use syncdown_core::WallTime;

    #[derive(Default)]
    struct RecordingSink {
        seen: Vec<TimerEnvelope>,
    }

    impl EnvelopeSink for RecordingSink {
        fn replace(&mut self, envelope: &TimerEnvelope) {
            self.seen.push(envelope.clone());
        }
    }

    const KEY: &str = "timer-app-state-v2";

    fn running_envelope() -> TimerEnvelope {
        TimerEnvelope::running_until(
            1,
            60,
            WallTime::from_millis(61_000),
            WallTime::from_millis(1_000),
        )
    }

    #[test]
    fn test_publish_reaches_other_context() {
        let store = MemoryStore::new();
        let (a_store, _a_events) = store.attach(ContextId::new(1));
        let (b_store, mut b_events) = store.attach(ContextId::new(2));
        let a = ReplicationChannel::new(ContextId::new(1), KEY, a_store);
        let b = ReplicationChannel::new(ContextId::new(2), KEY, b_store);

        a.publish(&running_envelope()).unwrap();

        let event = b_events.try_recv().unwrap();
        let mut sink = RecordingSink::default();
        let adopted = b.on_store_event(&event, &mut sink).unwrap();
        assert_eq!(adopted, running_envelope());
        assert_eq!(sink.seen, vec![running_envelope()]);
        assert_eq!(a.stats().publishes, 1);
        assert_eq!(b.stats().adopted, 1);
    }

    #[test]
    fn test_malformed_change_is_ignored() {
        let store = MemoryStore::new();
        let (handle, _events) = store.attach(ContextId::new(1));
        let channel = ReplicationChannel::new(ContextId::new(1), KEY, handle);
        let mut sink = RecordingSink::default();

        assert!(channel.on_remote_change("{not json", &mut sink).is_none());
        assert!(channel.on_remote_change(r#"{"running":42}"#, &mut sink).is_none());
        assert!(sink.seen.is_empty());
        assert_eq!(channel.stats().rejected, 2);
    }

    #[test]
    fn test_other_keys_and_removals_ignored() {
        let store = MemoryStore::new();
        let (handle, _events) = store.attach(ContextId::new(1));
        let channel = ReplicationChannel::new(ContextId::new(1), KEY, handle);
        let mut sink = RecordingSink::default();
        let raw = running_envelope().encode().unwrap();

        let other_key = StoreEvent {
            key: "something-else".into(),
            new_value: Some(raw),
        };
        let removal = StoreEvent {
            key: KEY.into(),
            new_value: None,
        };
        assert!(channel.on_store_event(&other_key, &mut sink).is_none());
        assert!(channel.on_store_event(&removal, &mut sink).is_none());
        assert!(sink.seen.is_empty());
    }

    #[test]
    fn test_bootstrap_fresh_does_not_write() {
        let store = MemoryStore::new();
        let (handle, _events) = store.attach(ContextId::new(1));
        let (_other, mut other_events) = store.attach(ContextId::new(2));
        let channel = ReplicationChannel::new(ContextId::new(1), KEY, handle);
        let mut sink = RecordingSink::default();

        let outcome = channel.bootstrap(&mut sink, TimerEnvelope::defaults(WallTime::from_millis(7)));

        assert_eq!(outcome, Bootstrap::Fresh);
        assert_eq!(sink.seen, vec![TimerEnvelope::defaults(WallTime::from_millis(7))]);
        assert_eq!(store.peek(KEY), None);
        assert!(other_events.try_recv().is_err());
    }

    #[test]
    fn test_bootstrap_adopts_and_recovers() {
        let store = MemoryStore::new();
        store.write_external(KEY, &running_envelope().encode().unwrap());
        let (handle, _events) = store.attach(ContextId::new(1));
        let channel = ReplicationChannel::new(ContextId::new(1), KEY, handle);

        let mut sink = RecordingSink::default();
        assert_eq!(channel.bootstrap(&mut sink, TimerEnvelope::defaults(WallTime::ZERO)), Bootstrap::Adopted);
        assert_eq!(sink.seen, vec![running_envelope()]);

        store.write_external(KEY, "garbage");
        let mut sink = RecordingSink::default();
        assert_eq!(channel.bootstrap(&mut sink, TimerEnvelope::defaults(WallTime::ZERO)), Bootstrap::Recovered);
        assert_eq!(sink.seen, vec![TimerEnvelope::defaults(WallTime::ZERO)]);
    }

    #[test]
    fn test_bootstrap_with_storage_disabled() {
        let store = MemoryStore::new();
        let (handle, _events) = store.attach(ContextId::new(1));
        store.set_available(false);
        let channel = ReplicationChannel::new(ContextId::new(1), KEY, handle);
        let mut sink = RecordingSink::default();

        assert_eq!(channel.bootstrap(&mut sink, TimerEnvelope::defaults(WallTime::ZERO)), Bootstrap::Fresh);
        assert_eq!(sink.seen.len(), 1);
    }

    #[test]
    fn test_publish_failure_is_reported() {
        let store = MemoryStore::new();
        let (handle, _events) = store.attach(ContextId::new(1));
        let channel = ReplicationChannel::new(ContextId::new(1), KEY, handle);
        store.set_available(false);

        assert!(channel.publish(&running_envelope()).is_err());
        let stats = channel.stats();
        assert_eq!(stats.publish_failures, 1);
        assert_eq!(stats.publishes, 0);
    }

    #[test]
    fn test_subscribers_run_after_replace() {
        let store = MemoryStore::new();
        let (handle, _events) = store.attach(ContextId::new(1));
        let channel = ReplicationChannel::new(ContextId::new(1), KEY, handle);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = channel.subscribe(move |env| {
            assert!(env.running());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let raw = running_envelope().encode().unwrap();
        let mut sink = RecordingSink::default();
        channel.on_remote_change(&raw, &mut sink);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Malformed payloads never reach subscribers
        channel.on_remote_change("oops", &mut sink);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.on_remote_change(&raw, &mut sink);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }
}
