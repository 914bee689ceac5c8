use crate::Signal;
use crate::frame::FrameScheduler;
use crate::notifier::FrameBatchedNotifier;
use parking_lot::RwLock;
use std::sync::Arc;

/// Single-slot value holder whose writes are visible at once but announced later.
///
/// - [`get`](ObservableCell::get) returns the latest value and subscribes the
///   running [`Watcher`](crate::Watcher).
/// - [`set`](ObservableCell::set) replaces the value immediately and asks the
///   cell's [`FrameBatchedNotifier`] for a notification. Every write in one
///   batching window shares a single notification, fired two frame
///   boundaries after the first write.
///
/// There is no equality check: setting the same value again still requests a
/// notification.
///
/// Cloning a cell clones the handle. Clones share the slot, the signal and the
/// batching window, so a clone can be moved into an engine event handler
/// while the original stays with its owner.
///
/// ```ignore
/// let frames = Arc::new(FrameQueue::new());
/// let cell = ObservableCell::new(0, frames.clone());
///
/// cell.set(1);
/// cell.set(2);
/// assert_eq!(cell.get(), 2);   // visible immediately
///
/// frames.run_frame();
/// frames.run_frame();           // one notification for both writes
/// flush_watchers();
/// ```
pub struct ObservableCell<T> {
    inner: Arc<CellInner<T>>,
}

struct CellInner<T> {
    value: RwLock<T>,
    notifier: FrameBatchedNotifier,
    signal: Signal,
}

impl<T> ObservableCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cell holding `value`, batching notifications on `frames`
    pub fn new(value: T, frames: Arc<dyn FrameScheduler>) -> Self {
        let signal = Signal::new();
        let notifier = FrameBatchedNotifier::new(&signal, frames);
        Self {
            inner: Arc::new(CellInner {
                value: RwLock::new(value),
                notifier,
                signal,
            }),
        }
    }

    /// Read the current value and track it as a dependency
    pub fn get(&self) -> T {
        self.inner.signal.track_dependency();
        self.inner.value.read().clone()
    }

    /// Borrow the current value and track it as a dependency.
    ///
    /// Avoids the clone of [`get`](ObservableCell::get). Do not write to this
    /// cell from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.signal.track_dependency();
        f(&self.inner.value.read())
    }

    /// Read the current value without subscribing anyone
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Replace the value now, notify dependents at the end of the batching window
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        tracing::trace!(signal = self.inner.signal.node_id().index(), "cell written");
        self.inner.notifier.request();
    }

    /// Whether a write is waiting for its notification
    pub fn is_notification_pending(&self) -> bool {
        self.inner.notifier.is_pending()
    }

    /// Number of batched notifications this cell has fired
    pub fn notifications_fired(&self) -> u64 {
        self.inner.notifier.notifications_fired()
    }

    /// Number of watchers currently depending on this cell
    pub fn dependent_count(&self) -> usize {
        self.inner.signal.subscriber_count()
    }
}

impl<T> Clone for ObservableCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableCell")
            .field("value", &*self.inner.value.read())
            .field("pending", &self.inner.notifier.is_pending())
            .finish()
    }
}
