// Watcher arena - storage for watcher metadata
//
// A watcher is a reactive dependent: a callback plus the signals it read on
// its last run. Watchers track sources only; signals track subscribers only.
//
// PENDING SETS:
// Watchers notified since the last flush live in PENDING_WATCHERS, one set per
// owner thread (the thread that created the watcher). A frame thread may
// notify, but only the owner's flush runs the watcher. Insertion is guarded by
// the per-watcher `dirty` flag, so a watcher notified twenty times between two
// flushes is queued (and later run) once.
//
// CURRENT WATCHER:
// While a watcher's callback runs, CURRENT_WATCHER names it. Signal reads
// consult it to subscribe the running watcher automatically.

use super::SignalId;
use crate::hash::FastHashBuilder;
use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use slab::Slab;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, ThreadId};

pub(crate) type WatcherCallback = Box<dyn FnMut() + Send>;

/// Global watcher arena
static WATCHER_ARENA: RwLock<Slab<WatcherMetadata>> = RwLock::new(Slab::new());

/// Source of slot generations; bumped on every insert
static NEXT_GENERATION: AtomicU32 = AtomicU32::new(0);

type PendingSet = IndexSet<WatcherId, FastHashBuilder>;

/// Watchers waiting for their owner thread's next flush, in notification order
static PENDING_WATCHERS: LazyLock<Mutex<HashMap<ThreadId, PendingSet, FastHashBuilder>>> =
    LazyLock::new(|| Mutex::new(HashMap::default()));

thread_local! {
    static CURRENT_WATCHER: Cell<Option<WatcherId>> = const { Cell::new(None) };
}

/// Get the watcher whose callback is running on this thread (if any)
pub fn current_watcher() -> Option<WatcherId> {
    CURRENT_WATCHER.with(Cell::get)
}

/// RAII guard that swaps CURRENT_WATCHER and restores it on drop, panics included.
pub struct CurrentWatcherGuard {
    previous: Option<WatcherId>,
}

impl CurrentWatcherGuard {
    pub fn new(watcher: Option<WatcherId>) -> Self {
        let previous = CURRENT_WATCHER.with(|current| current.replace(watcher));
        Self { previous }
    }
}

impl Drop for CurrentWatcherGuard {
    fn drop(&mut self) {
        CURRENT_WATCHER.with(|current| current.set(self.previous));
    }
}

/// Slab index of a watcher, tagged with the generation of its slot.
///
/// Becomes stale once the owning `Watcher` is dropped; every accessor
/// returns `None` (or does nothing) for a stale id.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct WatcherId {
    index: u32,
    generation: u32,
}

impl WatcherId {
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Access the watcher metadata with a closure (read-only)
    pub fn with<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&WatcherMetadata) -> R,
    {
        let arena = WATCHER_ARENA.read();
        arena
            .get(self.index())
            .filter(|metadata| metadata.generation == self.generation)
            .map(f)
    }

    pub fn add_source(self, signal_id: SignalId) {
        self.with(|metadata| {
            metadata.sources.lock().insert(signal_id);
        });
    }

    pub fn remove_source(self, signal_id: SignalId) {
        self.with(|metadata| {
            metadata.sources.lock().swap_remove(&signal_id);
        });
    }

    /// Drain the recorded sources, leaving the watcher with none
    pub fn take_sources(self) -> Vec<SignalId> {
        self.with(|metadata| metadata.sources.lock().drain(..).collect())
            .unwrap_or_default()
    }

    pub fn source_count(self) -> usize {
        self.with(|metadata| metadata.sources.lock().len())
            .unwrap_or(0)
    }

    pub fn is_dirty(self) -> bool {
        self.with(|metadata| metadata.dirty.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn owner(self) -> Option<ThreadId> {
        self.with(|metadata| metadata.owner)
    }

    pub fn clear_dirty(self) {
        self.with(|metadata| metadata.dirty.store(false, Ordering::Release));
    }

    /// Run the callback with this watcher as the current one.
    ///
    /// The callback is moved out of the arena for the duration of the call so
    /// it may create or drop other watchers without holding the arena lock.
    pub fn run_callback(self) {
        struct CallbackGuard {
            watcher_id: WatcherId,
            callback: Option<WatcherCallback>,
        }

        impl Drop for CallbackGuard {
            fn drop(&mut self) {
                let mut callback = self.callback.take();
                if callback.is_none() {
                    return;
                }
                // Hand the callback back unless the watcher was dropped while it
                // ran; in that case it is dropped here, outside the arena lock.
                self.watcher_id.with(|metadata| {
                    *metadata.callback.lock() = callback.take();
                });
                if callback.is_some() {
                    tracing::trace!(
                        watcher = self.watcher_id.index(),
                        "watcher dropped during its own run"
                    );
                }
            }
        }

        let callback = self
            .with(|metadata| metadata.callback.lock().take())
            .flatten();
        let mut guard = CallbackGuard {
            watcher_id: self,
            callback,
        };

        let _current = CurrentWatcherGuard::new(Some(self));
        if let Some(callback) = guard.callback.as_mut() {
            callback();
        }
    }
}

/// Metadata for a watcher stored in the arena.
pub struct WatcherMetadata {
    /// `None` while the callback is executing
    callback: Mutex<Option<WatcherCallback>>,
    /// Signals read during the last run
    sources: Mutex<IndexSet<SignalId, FastHashBuilder>>,
    /// Set between notification and the next run
    dirty: AtomicBool,
    /// Thread whose flush runs this watcher
    owner: ThreadId,
    generation: u32,
}

impl WatcherMetadata {
    pub fn new(callback: WatcherCallback) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
            sources: Mutex::new(IndexSet::default()),
            dirty: AtomicBool::new(false),
            owner: thread::current().id(),
            generation: 0,
        }
    }
}

pub fn watcher_arena_insert(mut metadata: WatcherMetadata) -> WatcherId {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    metadata.generation = generation;

    let mut arena = WATCHER_ARENA.write();
    let entry = arena.vacant_entry();
    let index = entry.key() as u32;
    entry.insert(metadata);
    WatcherId { index, generation }
}

/// Remove a watcher from the arena; the caller drops the metadata outside the lock
pub fn watcher_arena_remove(id: WatcherId) -> Option<WatcherMetadata> {
    let mut arena = WATCHER_ARENA.write();
    match arena.get(id.index()) {
        Some(metadata) if metadata.generation == id.generation => Some(arena.remove(id.index())),
        _ => None,
    }
}

/// Mark a watcher dirty and queue it for its owner's next flush.
///
/// Returns true if the watcher was clean before, false if it was already
/// queued (or is stale).
pub fn mark_watcher_pending(watcher_id: WatcherId) -> bool {
    let owner = watcher_id
        .with(|metadata| (!metadata.dirty.swap(true, Ordering::AcqRel)).then_some(metadata.owner))
        .flatten();

    match owner {
        Some(owner) => {
            PENDING_WATCHERS
                .lock()
                .entry(owner)
                .or_default()
                .insert(watcher_id);
            true
        }
        None => false,
    }
}

/// Take the calling thread's pending watchers
pub fn take_pending_watchers() -> Vec<WatcherId> {
    let current = thread::current().id();
    PENDING_WATCHERS
        .lock()
        .remove(&current)
        .map(|pending| pending.into_iter().collect())
        .unwrap_or_default()
}

/// Whether the calling thread has watchers waiting for a flush
pub fn has_pending_watchers() -> bool {
    let current = thread::current().id();
    PENDING_WATCHERS
        .lock()
        .get(&current)
        .is_some_and(|pending| !pending.is_empty())
}

/// Remove a watcher from its owner's pending set (used when a watcher is dropped)
pub fn remove_from_pending_set(watcher_id: WatcherId) {
    let Some(owner) = watcher_id.owner() else {
        return;
    };
    let mut pending = PENDING_WATCHERS.lock();
    if let Some(set) = pending.get_mut(&owner) {
        set.shift_remove(&watcher_id);
        if set.is_empty() {
            pending.remove(&owner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn repeated_marks_queue_once() {
        let id = watcher_arena_insert(WatcherMetadata::new(Box::new(|| {})));

        assert!(mark_watcher_pending(id));
        assert!(!mark_watcher_pending(id));
        assert!(!mark_watcher_pending(id));
        assert!(id.is_dirty());
        assert!(has_pending_watchers());

        remove_from_pending_set(id);
        assert!(!has_pending_watchers());
        watcher_arena_remove(id);
    }

    #[test]
    fn stale_id_is_inert() {
        let id = watcher_arena_insert(WatcherMetadata::new(Box::new(|| {})));
        watcher_arena_remove(id);

        assert!(!mark_watcher_pending(id));
        assert!(!id.is_dirty());
        assert_eq!(id.source_count(), 0);
        assert!(id.take_sources().is_empty());
        id.run_callback();
    }

    #[test]
    fn notification_from_another_thread_lands_with_owner() {
        let id = watcher_arena_insert(WatcherMetadata::new(Box::new(|| {})));

        let queued = thread::spawn(move || {
            let queued = mark_watcher_pending(id);
            (queued, take_pending_watchers().len())
        })
        .join()
        .unwrap();

        assert_eq!(queued, (true, 0));
        assert_eq!(take_pending_watchers(), vec![id]);
        watcher_arena_remove(id);
    }

    #[test]
    fn callback_is_restored_after_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let id = watcher_arena_insert(WatcherMetadata::new(Box::new(move || {
            assert!(current_watcher().is_some());
            runs_clone.fetch_add(1, Ordering::Relaxed);
        })));

        id.run_callback();
        id.run_callback();

        assert_eq!(runs.load(Ordering::Relaxed), 2);
        assert_eq!(current_watcher(), None);
        watcher_arena_remove(id);
    }
}
