use crate::arena::{SignalId, SignalMetadata, signal_arena_insert, signal_arena_remove};

/// Lightweight reactive marker that tracks dependents without owning data.
///
/// A `Signal` is 4 bytes of metadata; the guarded value stays in your struct.
/// Reads call [`track_dependency`](Signal::track_dependency), writes call
/// [`emit`](Signal::emit):
///
/// ```ignore
/// struct Caret {
///     offset: usize,
///     signal: Signal,
/// }
///
/// impl Caret {
///     fn offset(&self) -> usize {
///         self.signal.track_dependency();
///         self.offset
///     }
///
///     fn move_to(&mut self, offset: usize) {
///         self.offset = offset;
///         self.signal.emit();
///     }
/// }
/// ```
///
/// `emit` is immediate: subscribers are queued for the next
/// [`flush_watchers`](crate::flush_watchers). For writes that should reach
/// dependents only after the UI has painted, wrap the value in an
/// [`ObservableCell`](crate::ObservableCell) instead.
pub struct Signal {
    node_id: SignalId,
}

impl Signal {
    /// Create a new signal and allocate it in the arena
    pub fn new() -> Self {
        let node_id = signal_arena_insert(SignalMetadata::new());
        Signal { node_id }
    }

    pub(crate) fn node_id(&self) -> SignalId {
        self.node_id
    }

    /// Subscribe the running [`Watcher`](crate::Watcher) (if any) to this signal
    pub fn track_dependency(&self) {
        self.node_id.track_dependency();
    }

    /// Queue every subscriber for the next flush
    pub fn emit(&self) {
        emit_signal(self.node_id);
    }

    /// Number of watchers currently subscribed
    pub fn subscriber_count(&self) -> usize {
        self.node_id.subscriber_count()
    }
}

/// Notify a signal by id, tolerating ids whose `Signal` was already dropped
pub(crate) fn emit_signal(signal_id: SignalId) {
    let queued = signal_id.notify_subscribers();
    tracing::trace!(signal = signal_id.index(), queued, "signal emitted");
}

impl Drop for Signal {
    fn drop(&mut self) {
        for watcher_id in self.node_id.subscribers() {
            watcher_id.remove_source(self.node_id);
        }
        signal_arena_remove(self.node_id);
    }
}

// NOTE: Signal does not implement Clone. Two owners of one SignalId would both
// free the arena slot on drop. Share the owner (Arc) instead.

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
