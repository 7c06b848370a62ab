//! Shared key-value storage with change notification
//!
//! Models the storage primitive every context shares: `get`, `put`, and a
//! best-effort notification delivered asynchronously to every context except
//! the writer. [`MemoryStore`] is the in-process implementation; anything
//! else (a file, a browser bridge) only needs to implement [`SharedStore`]
//! and feed [`StoreEvent`]s to its contexts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use syncdown_core::{ContextId, SyncdownError, SyncdownResult};

/// Key-value storage shared between contexts
pub trait SharedStore: Send + Sync {
    /// Read the current value of `key`
    fn get(&self, key: &str) -> SyncdownResult<Option<String>>;

    /// Write `value` at `key` and notify the other contexts
    fn put(&self, key: &str, value: &str) -> SyncdownResult<()>;
}

impl<T: SharedStore + ?Sized> SharedStore for Arc<T> {
    fn get(&self, key: &str) -> SyncdownResult<Option<String>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> SyncdownResult<()> {
        (**self).put(key, value)
    }
}

/// Notification that another context changed a key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
    /// New value, `None` when the key was removed or storage cleared
    pub new_value: Option<String>,
}

/// Per-context stream of change notifications
pub type StoreEvents = mpsc::UnboundedReceiver<StoreEvent>;

struct Listener {
    context: ContextId,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

struct MemoryInner {
    entries: RwLock<HashMap<String, String>>,
    listeners: Mutex<Vec<Listener>>,
    available: AtomicBool,
    quota: Option<usize>,
}

/// In-process shared store
///
/// Cloning yields another reference to the same storage. Contexts join with
/// [`MemoryStore::attach`].
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Store that refuses writes once keys plus values exceed `limit` bytes
    pub fn with_quota(limit: usize) -> Self {
        Self::build(Some(limit))
    }

    fn build(quota: Option<usize>) -> Self {
        MemoryStore {
            inner: Arc::new(MemoryInner {
                entries: RwLock::new(HashMap::new()),
                listeners: Mutex::new(Vec::new()),
                available: AtomicBool::new(true),
                quota,
            }),
        }
    }

    /// Join a context: returns its storage handle and its change stream
    pub fn attach(&self, context: ContextId) -> (MemoryStoreHandle, StoreEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.listeners.lock().push(Listener { context, tx });
        (
            MemoryStoreHandle {
                store: self.clone(),
                context,
            },
            rx,
        )
    }

    /// Simulate storage being disabled or re-enabled
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Inspect a value without going through a context
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.entries.read().get(key).cloned()
    }

    /// Write from outside any context (devtools, another app version).
    /// Every attached context is notified.
    pub fn write_external(&self, key: &str, value: &str) {
        let mut entries = self.inner.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.broadcast(
            None,
            StoreEvent {
                key: key.to_string(),
                new_value: Some(value.to_string()),
            },
        );
    }

    /// Remove every key and notify every context
    pub fn clear(&self) {
        let mut entries = self.inner.entries.write();
        let keys: Vec<String> = entries.drain().map(|(k, _)| k).collect();
        for key in keys {
            self.broadcast(
                None,
                StoreEvent {
                    key,
                    new_value: None,
                },
            );
        }
    }

    /// Number of live change streams
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|l| !l.tx.is_closed());
        listeners.len()
    }

    /// Fan an event out to every context except `origin`, in write order.
    /// Callers hold the entries write lock so concurrent writers cannot interleave.
    fn broadcast(&self, origin: Option<ContextId>, event: StoreEvent) {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|l| !l.tx.is_closed());
        for listener in listeners.iter() {
            if Some(listener.context) == origin {
                continue;
            }
            // Receiver dropped between retain and send; pruned next time.
            let _ = listener.tx.send(event.clone());
        }
    }

    fn put_from(&self, origin: ContextId, key: &str, value: &str) -> SyncdownResult<()> {
        if !self.is_available() {
            return Err(SyncdownError::StorageUnavailable);
        }

        let mut entries = self.inner.entries.write();
        if entries.get(key).map(String::as_str) == Some(value) {
            // Rewriting an identical value raises no notification
            return Ok(());
        }

        if let Some(limit) = self.inner.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(SyncdownError::QuotaExceeded { needed, limit });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        self.broadcast(
            Some(origin),
            StoreEvent {
                key: key.to_string(),
                new_value: Some(value.to_string()),
            },
        );
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One context's view of a [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryStoreHandle {
    store: MemoryStore,
    context: ContextId,
}

impl MemoryStoreHandle {
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl SharedStore for MemoryStoreHandle {
    fn get(&self, key: &str) -> SyncdownResult<Option<String>> {
        if !self.store.is_available() {
            return Err(SyncdownError::StorageUnavailable);
        }
        Ok(self.store.peek(key))
    }

    fn put(&self, key: &str, value: &str) -> SyncdownResult<()> {
        self.store.put_from(self.context, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_notifies_others_not_writer() {
        let store = MemoryStore::new();
        let (a, mut a_events) = store.attach(ContextId::new(1));
        let (_b, mut b_events) = store.attach(ContextId::new(2));

        a.put("k", "v1").unwrap();

        assert_eq!(a.get("k").unwrap().as_deref(), Some("v1"));
        assert!(a_events.try_recv().is_err());
        let event = b_events.try_recv().unwrap();
        assert_eq!(event.key, "k");
        assert_eq!(event.new_value.as_deref(), Some("v1"));
    }

    #[test]
    fn test_notifications_in_write_order() {
        let store = MemoryStore::new();
        let (a, _a_events) = store.attach(ContextId::new(1));
        let (_b, mut b_events) = store.attach(ContextId::new(2));

        for i in 0..5 {
            a.put("k", &i.to_string()).unwrap();
        }

        let seen: Vec<String> = std::iter::from_fn(|| b_events.try_recv().ok())
            .filter_map(|e| e.new_value)
            .collect();
        assert_eq!(seen, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_identical_write_is_silent() {
        let store = MemoryStore::new();
        let (a, _a_events) = store.attach(ContextId::new(1));
        let (_b, mut b_events) = store.attach(ContextId::new(2));

        a.put("k", "same").unwrap();
        a.put("k", "same").unwrap();

        assert!(b_events.try_recv().is_ok());
        assert!(b_events.try_recv().is_err());
    }

    #[test]
    fn test_unavailable_store() {
        let store = MemoryStore::new();
        let (a, _events) = store.attach(ContextId::new(1));
        store.set_available(false);

        assert!(matches!(a.put("k", "v"), Err(SyncdownError::StorageUnavailable)));
        assert!(matches!(a.get("k"), Err(SyncdownError::StorageUnavailable)));

        store.set_available(true);
        assert!(a.put("k", "v").is_ok());
    }

    #[test]
    fn test_quota_exceeded() {
        let store = MemoryStore::with_quota(8);
        let (a, _events) = store.attach(ContextId::new(1));

        assert!(a.put("k", "1234567").is_ok());
        let err = a.put("k", "12345678").unwrap_err();
        assert!(matches!(err, SyncdownError::QuotaExceeded { needed: 9, limit: 8 }));
        // Failed write leaves the previous value
        assert_eq!(store.peek("k").as_deref(), Some("1234567"));
    }

    #[test]
    fn test_external_write_and_clear_reach_everyone() {
        let store = MemoryStore::new();
        let (_a, mut a_events) = store.attach(ContextId::new(1));

        store.write_external("k", "x");
        assert_eq!(a_events.try_recv().unwrap().new_value.as_deref(), Some("x"));

        store.clear();
        assert_eq!(a_events.try_recv().unwrap().new_value, None);
        assert_eq!(store.peek("k"), None);
    }

    #[test]
    fn test_dropped_listeners_are_pruned() {
        let store = MemoryStore::new();
        let (_a, a_events) = store.attach(ContextId::new(1));
        let (_b, _b_events) = store.attach(ContextId::new(2));
        assert_eq!(store.listener_count(), 2);

        drop(a_events);
        assert_eq!(store.listener_count(), 1);
    }
}
