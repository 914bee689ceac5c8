// Signal arena - storage for signal metadata
//
// A signal is pure notification metadata: the set of watchers subscribed to
// it. The value a signal guards lives next to it (in an ObservableCell or a
// RendererRegistry), never in the arena.

use super::WatcherId;
use super::watcher_arena::{current_watcher, mark_watcher_pending};
use crate::hash::FastHashBuilder;
use indexmap::IndexSet;
use parking_lot::RwLock;
use slab::Slab;
use std::sync::atomic::{AtomicU32, Ordering};

/// Global signal arena
static SIGNAL_ARENA: RwLock<Slab<SignalMetadata>> = RwLock::new(Slab::new());

/// Source of slot generations; bumped on every insert
static NEXT_GENERATION: AtomicU32 = AtomicU32::new(0);

/// Slab index of a signal, tagged with the generation of its slot.
///
/// Becomes stale once the owning `Signal` is dropped. A stale id can still be
/// notified (frame callbacks may outlive the cell they were scheduled for);
/// it reaches nobody, even after its slot was reused.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SignalId {
    index: u32,
    generation: u32,
}

impl SignalId {
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Access the signal metadata with a closure (read-only)
    ///
    /// Returns None if the signal has been removed (stale access).
    pub fn with<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&SignalMetadata) -> R,
    {
        let arena = SIGNAL_ARENA.read();
        arena
            .get(self.index())
            .filter(|metadata| metadata.generation == self.generation)
            .map(f)
    }

    /// Subscribe the running watcher (if any) to this signal
    pub fn track_dependency(self) {
        if let Some(watcher_id) = current_watcher() {
            watcher_id.add_source(self);
            self.add_subscriber(watcher_id);
        }
    }

    pub fn add_subscriber(self, watcher_id: WatcherId) {
        self.with(|metadata| {
            metadata.subscribers.write().insert(watcher_id);
        });
    }

    pub fn remove_subscriber(self, watcher_id: WatcherId) {
        self.with(|metadata| {
            metadata.subscribers.write().shift_remove(&watcher_id);
        });
    }

    /// Snapshot of the current subscribers, in subscription order
    pub fn subscribers(self) -> Vec<WatcherId> {
        self.with(|metadata| metadata.subscribers.read().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(self) -> usize {
        self.with(|metadata| metadata.subscribers.read().len())
            .unwrap_or(0)
    }

    /// Queue every subscriber for the next flush.
    ///
    /// Subscribers are copied out first so no signal lock is held while the
    /// watcher arena is touched. Returns how many watchers were newly queued.
    pub fn notify_subscribers(self) -> usize {
        self.subscribers()
            .into_iter()
            .filter(|&watcher_id| mark_watcher_pending(watcher_id))
            .count()
    }
}

/// Metadata for a signal stored in the arena.
#[derive(Debug, Default)]
pub struct SignalMetadata {
    pub(crate) subscribers: RwLock<IndexSet<WatcherId, FastHashBuilder>>,
    generation: u32,
}

impl SignalMetadata {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn signal_arena_insert(mut metadata: SignalMetadata) -> SignalId {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    metadata.generation = generation;

    let mut arena = SIGNAL_ARENA.write();
    let entry = arena.vacant_entry();
    let index = entry.key() as u32;
    entry.insert(metadata);
    SignalId { index, generation }
}

pub fn signal_arena_remove(id: SignalId) -> Option<SignalMetadata> {
    let mut arena = SIGNAL_ARENA.write();
    match arena.get(id.index()) {
        Some(metadata) if metadata.generation == id.generation => Some(arena.remove(id.index())),
        _ => None,
    }
}
