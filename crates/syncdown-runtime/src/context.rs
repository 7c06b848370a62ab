//! Timer context - one engine plus one replication channel
//!
//! A context is what a tab owns. It is built explicitly at startup and
//! handed to whatever renders it; nothing is reached through a global.
//! Every command funnels into a single publish, and every storage
//! notification funnels into a single adoption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use syncdown_core::{format_clock, parse_minutes, ContextId, TimerEnvelope};
use syncdown_state::{
    Bootstrap, ChannelStats, EnvelopeSink, ReplicationChannel, SharedStore, StoreEvent,
    SubscriptionId,
};
use syncdown_time::{Clock, TickToken};

use crate::{ContextConfig, TickOutcome, TimerEngine, TimerPhase};

/// Fresh random context identity
pub fn random_context_id() -> ContextId {
    ContextId::new(rand::random())
}

/// Adopts under the engine lock and releases it before subscribers run
struct LockedEngine<'a>(&'a Mutex<TimerEngine>);

impl EnvelopeSink for LockedEngine<'_> {
    fn replace(&mut self, envelope: &TimerEnvelope) {
        self.0.lock().adopt(envelope);
    }
}

/// One context's timer
pub struct TimerContext<S> {
    id: ContextId,
    engine: Mutex<TimerEngine>,
    channel: ReplicationChannel<S>,
    bootstrap: Bootstrap,
    closed: AtomicBool,
}

impl<S: SharedStore> TimerContext<S> {
    /// Build a context and seed it from shared storage (never writes)
    pub fn open(id: ContextId, config: &ContextConfig, store: S, clock: Arc<dyn Clock>) -> Self {
        let defaults = config.defaults_envelope(clock.now());
        let mut engine = TimerEngine::new(clock, config.countdown.clone());
        let channel = ReplicationChannel::new(id, config.storage_key.clone(), store);
        let bootstrap = channel.bootstrap(&mut engine, defaults);

        info!(
            context = %id,
            key = %config.storage_key,
            ?bootstrap,
            running = engine.running(),
            "context opened"
        );

        TimerContext {
            id,
            engine: Mutex::new(engine),
            channel,
            bootstrap,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// How this context obtained its initial state
    pub fn bootstrap_outcome(&self) -> Bootstrap {
        self.bootstrap
    }

    pub fn channel(&self) -> &ReplicationChannel<S> {
        &self.channel
    }

    pub fn stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Seconds left, derived live while running
    pub fn time_left(&self) -> i64 {
        self.engine.lock().time_left()
    }

    pub fn configured_minutes(&self) -> u32 {
        self.engine.lock().configured_minutes()
    }

    pub fn running(&self) -> bool {
        self.engine.lock().running()
    }

    pub fn phase(&self) -> TimerPhase {
        self.engine.lock().phase()
    }

    pub fn label(&self) -> Option<String> {
        self.engine.lock().label().map(str::to_owned)
    }

    /// Format any second count as `[-]MM:SS`
    pub fn format(&self, seconds: i64) -> String {
        format_clock(seconds)
    }

    /// Current clock face
    pub fn display(&self) -> String {
        format_clock(self.time_left())
    }

    /// Current state as it would be published now
    pub fn snapshot(&self) -> TimerEnvelope {
        self.engine.lock().envelope()
    }

    /// Whether a countdown recomputation is armed in this context
    pub fn is_ticking(&self) -> bool {
        self.engine.lock().is_ticking()
    }

    pub fn pending_tick(&self) -> Option<TickToken> {
        self.engine.lock().pending_tick()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn start(&self) {
        self.command("start", TimerEngine::start);
    }

    pub fn pause(&self) {
        self.command("pause", TimerEngine::pause);
    }

    pub fn reset(&self) {
        self.command("reset", TimerEngine::reset);
    }

    /// Set the configured duration; zero or negative becomes one minute
    pub fn reconfigure(&self, minutes: i64) {
        self.command("reconfigure", |engine| engine.reconfigure(Some(minutes)));
    }

    /// Set the configured duration from free-form text input
    pub fn reconfigure_input(&self, input: &str) {
        let minutes = parse_minutes(input);
        self.command("reconfigure", |engine| engine.reconfigure(minutes));
    }

    /// Set or clear the replicated display label
    pub fn set_label(&self, label: Option<String>) {
        self.command("set_label", |engine| engine.set_label(label));
    }

    // ------------------------------------------------------------------
    // Scheduling and notifications
    // ------------------------------------------------------------------

    /// Run the armed recomputation, publishing if the second changed
    pub fn pump_frame(&self) -> TickOutcome {
        let mut engine = self.engine.lock();
        let outcome = engine.tick_pending();
        if let TickOutcome::Changed(envelope) = &outcome {
            self.publish(envelope);
        }
        outcome
    }

    /// Run the recomputation armed under `token`; stale tokens do nothing
    pub fn fire_tick(&self, token: TickToken) -> TickOutcome {
        let mut engine = self.engine.lock();
        let outcome = engine.tick(token);
        if let TickOutcome::Changed(envelope) = &outcome {
            self.publish(envelope);
        }
        outcome
    }

    /// Apply a storage notification. Returns whether state was replaced.
    pub fn handle_store_event(&self, event: &StoreEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut sink = LockedEngine(&self.engine);
        self.channel.on_store_event(event, &mut sink).is_some()
    }

    /// Apply a raw payload written by another context
    pub fn handle_remote_change(&self, raw: &str) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut sink = LockedEngine(&self.engine);
        self.channel.on_remote_change(raw, &mut sink).is_some()
    }

    /// Run `callback` after every remote state replacement
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TimerEnvelope) + Send + Sync + 'static,
    {
        self.channel.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.channel.unsubscribe(id)
    }

    /// Stop this context's own scheduling and ignore further notifications
    pub fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.engine.lock().teardown();
        info!(context = %self.id, cancelled, "context torn down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mutate under the engine lock and publish before releasing it, so a
    /// frame tick can never land its write after a later command's write.
    fn command<F>(&self, name: &'static str, f: F)
    where
        F: FnOnce(&mut TimerEngine) -> TimerEnvelope,
    {
        let mut engine = self.engine.lock();
        let envelope = f(&mut engine);
        debug!(
            context = %self.id,
            command = name,
            running = envelope.running(),
            remaining = envelope.remaining_secs(),
            "command applied"
        );
        self.publish(&envelope);
    }

    fn publish(&self, envelope: &TimerEnvelope) {
        // Local countdown never depends on replication succeeding
        if self.channel.publish(envelope).is_err() {
            debug!(context = %self.id, "continuing locally without replication");
        }
    }
}
