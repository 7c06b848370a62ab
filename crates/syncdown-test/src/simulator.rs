//! Multi-context simulator - deterministic harness for replication testing
//!
//! Simulates:
//! - Several contexts sharing one store and one wall clock
//! - Delayed, per-receiver in-order notification delivery
//! - Late and skipped frames
//! - Storage outages and context teardown

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use syncdown_core::{ContextId, WallTime};
use syncdown_runtime::{ContextConfig, TimerContext};
use syncdown_state::{MemoryStore, MemoryStoreHandle, StoreEvent, StoreEvents};
use syncdown_time::{Clock, ManualClock};

use crate::chaos::{ChaosConfig, ChaosStats, DeliveryModel};

/// Start of simulated time
pub const SIM_EPOCH: WallTime = WallTime(1_700_000_000_000);

/// One simulated tab
pub struct SimulatedContext {
    context: TimerContext<MemoryStoreHandle>,
    events: StoreEvents,
    inbox: VecDeque<(WallTime, StoreEvent)>,
    /// Due time of the newest queued notification; keeps delivery in order
    last_due: WallTime,
    next_frame: WallTime,
}

impl SimulatedContext {
    pub fn context(&self) -> &TimerContext<MemoryStoreHandle> {
        &self.context
    }

    /// Notifications received but not yet delivered
    pub fn in_flight(&self) -> usize {
        self.inbox.len()
    }
}

/// Simulation statistics
#[derive(Clone, Debug, Default)]
pub struct SimStats {
    pub frames: u64,
    pub notifications_delivered: u64,
    pub adoptions: u64,
    pub commands: u64,
}

/// Deterministic simulation of N contexts
pub struct Simulation {
    clock: Arc<ManualClock>,
    store: MemoryStore,
    config: ContextConfig,
    model: DeliveryModel,
    contexts: Vec<SimulatedContext>,
    next_id: u64,
    stats: SimStats,
}

impl Simulation {
    /// Build `count` contexts opened at [`SIM_EPOCH`]
    pub fn new(count: usize, config: ContextConfig, chaos: ChaosConfig, seed: u64) -> Self {
        let mut sim = Simulation {
            clock: Arc::new(ManualClock::new(SIM_EPOCH)),
            store: MemoryStore::new(),
            config,
            model: DeliveryModel::new(chaos, seed),
            contexts: Vec::with_capacity(count),
            next_id: 1,
            stats: SimStats::default(),
        };
        for _ in 0..count {
            sim.open_context();
        }
        sim
    }

    /// Open another context at the current instant. Returns its index.
    pub fn open_context(&mut self) -> usize {
        let id = ContextId::new(self.next_id);
        self.next_id += 1;
        let (handle, events) = self.store.attach(id);
        let context = TimerContext::open(id, &self.config, handle, self.clock.clone());
        let now = self.now();
        let first_frame = self.model.frame_delay(self.config.countdown.frame_interval);
        self.contexts.push(SimulatedContext {
            context,
            events,
            inbox: VecDeque::new(),
            last_due: now,
            next_frame: now + first_frame,
        });
        self.contexts.len() - 1
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn now(&self) -> WallTime {
        self.clock.now()
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn context(&self, index: usize) -> &TimerContext<MemoryStoreHandle> {
        &self.contexts[index].context
    }

    pub fn simulated(&self, index: usize) -> &SimulatedContext {
        &self.contexts[index]
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    pub fn chaos_stats(&self) -> &ChaosStats {
        self.model.stats()
    }

    /// Run a command on one context and queue its notifications
    pub fn command<F>(&mut self, index: usize, f: F)
    where
        F: FnOnce(&TimerContext<MemoryStoreHandle>),
    {
        f(&self.contexts[index].context);
        self.stats.commands += 1;
        self.collect();
    }

    /// Toggle shared storage availability
    pub fn set_storage_available(&mut self, available: bool) {
        self.store.set_available(available);
    }

    /// Tear one context down; it keeps receiving but ignores notifications
    pub fn close(&mut self, index: usize) {
        self.contexts[index].context.teardown();
    }

    /// Advance simulated time by `duration`, running frames and
    /// deliveries in timestamp order
    pub fn run_for(&mut self, duration: Duration) {
        let target = self.now() + duration;
        loop {
            self.collect();
            let Some(next) = self.next_action().filter(|t| *t <= target) else {
                break;
            };
            self.clock.set(next);
            self.run_frames(next);
            self.deliver_due(next);
        }
        self.clock.set(target);
        self.collect();
    }

    /// Deliver every queued notification now, without advancing time
    pub fn flush(&mut self) {
        loop {
            self.collect();
            if self.contexts.iter().all(|c| c.inbox.is_empty()) {
                break;
            }
            for i in 0..self.contexts.len() {
                while let Some((_, event)) = self.contexts[i].inbox.pop_front() {
                    self.apply(i, &event);
                }
                self.contexts[i].last_due = self.now();
            }
        }
    }

    /// Every open context reports the same logical state right now
    pub fn converged(&self) -> bool {
        let mut open = self.contexts.iter().filter(|c| !c.context.is_closed());
        let Some(first) = open.next() else {
            return true;
        };
        let reference = first.context.snapshot();
        let time_left = first.context.time_left();
        open.all(|c| {
            let snapshot = c.context.snapshot();
            snapshot.running() == reference.running()
                && snapshot.deadline() == reference.deadline()
                && snapshot.configured_minutes() == reference.configured_minutes()
                && snapshot.label() == reference.label()
                && c.context.time_left() == time_left
        })
    }

    /// `time_left` of every context
    pub fn time_lefts(&self) -> Vec<i64> {
        self.contexts.iter().map(|c| c.context.time_left()).collect()
    }

    /// Move freshly published notifications into the per-context inboxes
    fn collect(&mut self) {
        let now = self.now();
        for sim in &mut self.contexts {
            while let Ok(event) = sim.events.try_recv() {
                let due = now + self.model.notification_delay();
                let due = due.max(sim.last_due);
                sim.last_due = due;
                sim.inbox.push_back((due, event));
            }
        }
    }

    fn next_action(&self) -> Option<WallTime> {
        let frames = self
            .contexts
            .iter()
            .filter(|c| !c.context.is_closed())
            .map(|c| c.next_frame);
        let deliveries = self
            .contexts
            .iter()
            .filter_map(|c| c.inbox.front().map(|(due, _)| *due));
        frames.chain(deliveries).min()
    }

    fn run_frames(&mut self, now: WallTime) {
        let cadence = self.config.countdown.frame_interval;
        for i in 0..self.contexts.len() {
            if self.contexts[i].context.is_closed() || self.contexts[i].next_frame > now {
                continue;
            }
            if !self.model.skip_frame() {
                self.contexts[i].context.pump_frame();
                self.stats.frames += 1;
            }
            self.contexts[i].next_frame = now + self.model.frame_delay(cadence);
            // Queue this frame's publish before any later context runs
            self.collect();
        }
    }

    fn deliver_due(&mut self, now: WallTime) {
        for i in 0..self.contexts.len() {
            while self.contexts[i]
                .inbox
                .front()
                .is_some_and(|(due, _)| *due <= now)
            {
                if let Some((_, event)) = self.contexts[i].inbox.pop_front() {
                    self.apply(i, &event);
                }
            }
        }
    }

    fn apply(&mut self, index: usize, event: &StoreEvent) {
        self.stats.notifications_delivered += 1;
        if self.contexts[index].context.handle_store_event(event) {
            self.stats.adoptions += 1;
        }
    }
}
