// Arena-based storage for reactive node metadata
//
// Two arenas, both global slabs behind parking_lot RwLocks:
// - Signal arena: SignalMetadata (subscribers)
// - Watcher arena: WatcherMetadata (callback, sources, dirty flag)
//
// SignalId and WatcherId are u32 newtypes indexing into the slabs, so they
// are Copy and can be moved into frame callbacks on any thread. Watchers run
// on the thread that created them; any thread may notify them.

pub mod signal_arena;
pub mod watcher_arena;

pub use signal_arena::{SignalId, SignalMetadata, signal_arena_insert, signal_arena_remove};

pub use watcher_arena::{
    CurrentWatcherGuard, WatcherId, WatcherMetadata, has_pending_watchers, mark_watcher_pending,
    remove_from_pending_set, take_pending_watchers, watcher_arena_insert,
    watcher_arena_remove,
};
