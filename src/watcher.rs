use crate::arena::{
    CurrentWatcherGuard, WatcherId, WatcherMetadata, has_pending_watchers, mark_watcher_pending,
    remove_from_pending_set, take_pending_watchers, watcher_arena_insert, watcher_arena_remove,
};

/// Check whether watchers owned by this thread are waiting for [`flush_watchers`]
pub fn is_flush_scheduled() -> bool {
    has_pending_watchers()
}

/// Run every pending watcher owned by this thread, repeating until none is left.
///
/// Notifications may come from any thread (a [`FrameLoop`](crate::FrameLoop)
/// tick, for instance) but watchers only ever run here, on the thread that
/// created them. A watcher that emits a signal while running can queue
/// further watchers; those run in the same call. Returns the number of
/// watcher runs.
///
/// Hosts call this once per paint, after driving their frame source:
///
/// ```ignore
/// loop {
///     frames.run_frame();
///     flush_watchers();
///     paint();
/// }
/// ```
pub fn flush_watchers() -> usize {
    let mut total = 0;
    loop {
        let pending = take_pending_watchers();
        if pending.is_empty() {
            break;
        }
        for watcher_id in pending {
            if watcher_id.is_dirty() {
                run_watcher(watcher_id);
                total += 1;
            }
        }
    }
    total
}

/// Run a closure without subscribing the current watcher to anything it reads
pub fn untracked<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = CurrentWatcherGuard::new(None);
    f()
}

/// Drop the old subscriptions, then run the callback so it re-tracks
fn run_watcher(watcher_id: WatcherId) {
    watcher_id.clear_dirty();
    for source in watcher_id.take_sources() {
        source.remove_subscriber(watcher_id);
    }
    watcher_id.run_callback();
}

/// Reactive dependent: a callback that re-runs after the values it read change.
///
/// Runs once on creation. Every tracked read during a run (an
/// [`ObservableCell::get`](crate::ObservableCell::get), a
/// [`RendererRegistry`](crate::RendererRegistry) lookup, a raw
/// [`Signal::track_dependency`](crate::Signal::track_dependency)) subscribes
/// it. A notification marks it pending; [`flush_watchers`] runs it once, no
/// matter how many notifications arrived in between.
///
/// ```ignore
/// let state = editor.state_cell().cloned().unwrap();
/// let _view = Watcher::new(move || {
///     render(&state.get());
/// });
/// ```
pub struct Watcher {
    id: WatcherId,
}

impl Watcher {
    /// Create a watcher and run it immediately to collect its dependencies
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let id = watcher_arena_insert(WatcherMetadata::new(Box::new(f)));
        run_watcher(id);
        Self { id }
    }

    /// Queue this watcher for the next flush without any source changing
    pub fn invalidate(&self) {
        mark_watcher_pending(self.id);
    }

    /// Whether a notification arrived that has not been flushed yet
    pub fn is_pending(&self) -> bool {
        self.id.is_dirty()
    }

    /// Number of distinct signals read during the last run
    pub fn source_count(&self) -> usize {
        self.id.source_count()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        remove_from_pending_set(self.id);
        for source in self.id.take_sources() {
            source.remove_subscriber(self.id);
        }
        // The callback may own cells; drop it after the arena lock is released.
        let metadata = watcher_arena_remove(self.id);
        drop(metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Signal;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn watcher_runs_on_creation() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();

        let _watcher = Watcher::new(move || {
            runs_clone.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn rapid_invalidations_run_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::new(move || {
            runs_clone.fetch_add(1, Ordering::Relaxed);
        });

        for _ in 0..20 {
            watcher.invalidate();
        }
        assert!(watcher.is_pending());

        flush_watchers();

        // 1 initial + 1 batched
        assert_eq!(runs.load(Ordering::Relaxed), 2);
        assert!(!watcher.is_pending());
    }

    #[test]
    fn emit_queues_subscriber_until_flush() {
        let signal = Arc::new(Signal::new());
        let signal_clone = signal.clone();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();

        let _watcher = Watcher::new(move || {
            signal_clone.track_dependency();
            runs_clone.fetch_add(1, Ordering::Relaxed);
        });

        signal.emit();
        signal.emit();
        assert!(is_flush_scheduled());
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        flush_watchers();
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let signal = Arc::new(Signal::new());
        let signal_clone = signal.clone();

        let watcher = Watcher::new(move || {
            untracked(|| signal_clone.track_dependency());
        });

        assert_eq!(watcher.source_count(), 0);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn dependencies_are_recollected_each_run() {
        let first = Arc::new(Signal::new());
        let second = Arc::new(Signal::new());
        let use_second = Arc::new(AtomicBool::new(false));

        let (first_clone, second_clone, flag) = (first.clone(), second.clone(), use_second.clone());
        let watcher = Watcher::new(move || {
            if flag.load(Ordering::Relaxed) {
                second_clone.track_dependency();
            } else {
                first_clone.track_dependency();
            }
        });
        assert_eq!(first.subscriber_count(), 1);

        use_second.store(true, Ordering::Relaxed);
        watcher.invalidate();
        flush_watchers();

        assert_eq!(first.subscriber_count(), 0);
        assert_eq!(second.subscriber_count(), 1);
    }

    #[test]
    fn dropped_watcher_does_not_run() {
        let signal = Arc::new(Signal::new());
        let signal_clone = signal.clone();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::new(move || {
            signal_clone.track_dependency();
            runs_clone.fetch_add(1, Ordering::Relaxed);
        });
        signal.emit();
        drop(watcher);
        flush_watchers();

        assert_eq!(runs.load(Ordering::Relaxed), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
