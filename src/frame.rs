//! Rendering-frame sources for the notifier.
//!
//! A [`FrameScheduler`] is the one capability the host must provide: "run this
//! callback at the next frame boundary". Callbacks requested while a frame is
//! running belong to the frame after it, which is what lets the notifier wait
//! two boundaries by nesting one request inside another.
//!
//! Two implementations ship with the crate:
//!
//! - [`FrameQueue`]: a manually ticked queue. Hosts with their own paint loop
//!   call [`run_frame`](FrameQueue::run_frame) once per paint; tests use it to
//!   step frames deterministically.
//! - [`FrameLoop`]: a background thread that ticks a queue at a fixed interval,
//!   for hosts without a paint callback.
//!
//! ```ignore
//! // Host-driven frames
//! let frames = Arc::new(FrameQueue::new());
//! let editor = ReactiveEditor::new(options, frames.clone())?;
//! loop {
//!     frames.run_frame();
//!     flush_watchers();
//! }
//!
//! // Fixed-interval fallback
//! let frames = Arc::new(FrameLoop::new().interval(Duration::from_millis(8)).spawn());
//! ```

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback run at a frame boundary.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Default tick interval for [`FrameLoop`] (~60fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Host capability: run callbacks at rendering-frame boundaries.
pub trait FrameScheduler: Send + Sync {
    /// Run `callback` at the next frame boundary.
    ///
    /// Requests made from inside a frame callback run at the following frame.
    fn request_frame(&self, callback: FrameCallback);
}

impl<S: FrameScheduler + ?Sized> FrameScheduler for Arc<S> {
    fn request_frame(&self, callback: FrameCallback) {
        (**self).request_frame(callback);
    }
}

/// Manually ticked frame source.
#[derive(Default)]
pub struct FrameQueue {
    queued: Mutex<Vec<FrameCallback>>,
    frames: AtomicU64,
}

impl FrameQueue {
    /// Create an empty queue at frame 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Cross one frame boundary.
    ///
    /// Runs the callbacks queued before this call, in request order, and
    /// returns how many ran. Callbacks they request wait for the next call.
    pub fn run_frame(&self) -> usize {
        let callbacks = std::mem::take(&mut *self.queued.lock());
        let frame = self.frames.fetch_add(1, Ordering::AcqRel) + 1;
        let count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        if count > 0 {
            tracing::trace!(frame, callbacks = count, "frame ran");
        }
        count
    }

    /// Number of frame boundaries crossed so far
    pub fn frames_elapsed(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Number of callbacks waiting for the next frame
    pub fn queued_callbacks(&self) -> usize {
        self.queued.lock().len()
    }

    /// Whether the next frame has anything to run
    pub fn is_idle(&self) -> bool {
        self.queued.lock().is_empty()
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&self, callback: FrameCallback) {
        self.queued.lock().push(callback);
    }
}

/// Builder for a background thread that ticks frames at a fixed interval.
///
/// This is the fallback for hosts that have no paint callback of their own:
/// a frame boundary becomes "one interval later". The thread parks while no
/// callback is queued, so an idle editor costs nothing.
///
/// ```ignore
/// let frames = FrameLoop::new()
///     .interval(Duration::from_millis(8))
///     .spawn_fn(|f| {
///         std::thread::Builder::new()
///             .name("editor-frames".into())
///             .spawn(f)
///             .unwrap()
///     })
///     .spawn();
/// ```
#[allow(clippy::type_complexity)]
pub struct FrameLoop {
    interval: Duration,
    spawn_fn: Option<Box<dyn FnOnce(Box<dyn FnOnce() + Send>) -> JoinHandle<()> + Send>>,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    /// Create a builder with [`DEFAULT_FRAME_INTERVAL`] and `std::thread::spawn`
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_FRAME_INTERVAL,
            spawn_fn: None,
        }
    }

    /// Set the time between two frame boundaries.
    ///
    /// Default: 16ms
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set a custom thread spawning function (name, stack size, priority).
    pub fn spawn_fn<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Box<dyn FnOnce() + Send>) -> JoinHandle<()> + Send + 'static,
    {
        self.spawn_fn = Some(Box::new(f));
        self
    }

    /// Start the frame thread.
    ///
    /// The returned handle is the scheduler to hand to cells and editors.
    /// Dropping it stops the thread after its current tick.
    pub fn spawn(self) -> FrameLoopHandle {
        let shared = Arc::new(FrameLoopShared {
            queue: FrameQueue::new(),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
            stopped: AtomicBool::new(false),
        });

        let interval = self.interval;
        let loop_shared = Arc::clone(&shared);
        let loop_fn: Box<dyn FnOnce() + Send> = Box::new(move || {
            frame_loop(&loop_shared, interval);
        });

        tracing::debug!(interval_ms = interval.as_millis() as u64, "frame loop started");
        let thread = match self.spawn_fn {
            Some(spawn_fn) => spawn_fn(loop_fn),
            None => thread::spawn(loop_fn),
        };

        FrameLoopHandle {
            shared,
            thread: Some(thread),
        }
    }
}

struct FrameLoopShared {
    queue: FrameQueue,
    wake_lock: Mutex<()>,
    wake: Condvar,
    stopped: AtomicBool,
}

impl FrameLoopShared {
    fn wake(&self) {
        // Taking the lock orders this wake-up after the loop's emptiness check.
        let _guard = self.wake_lock.lock();
        self.wake.notify_one();
    }
}

fn frame_loop(shared: &FrameLoopShared, interval: Duration) {
    loop {
        {
            let mut guard = shared.wake_lock.lock();
            while shared.queue.is_idle() && !shared.stopped.load(Ordering::Acquire) {
                shared.wake.wait(&mut guard);
            }
        }
        if shared.stopped.load(Ordering::Acquire) {
            break;
        }

        thread::sleep(interval);
        shared.queue.run_frame();
    }
    tracing::debug!("frame loop stopped");
}

/// Scheduler backed by a running [`FrameLoop`] thread.
pub struct FrameLoopHandle {
    shared: Arc<FrameLoopShared>,
    thread: Option<JoinHandle<()>>,
}

impl FrameLoopHandle {
    /// Number of frame boundaries the thread has crossed
    pub fn frames_elapsed(&self) -> u64 {
        self.shared.queue.frames_elapsed()
    }

    /// Stop the thread and wait for it to exit.
    ///
    /// Callbacks still queued are dropped without running.
    pub fn shutdown(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("frame loop thread panicked");
            }
        }
    }

    fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.wake();
    }
}

impl FrameScheduler for FrameLoopHandle {
    fn request_frame(&self, callback: FrameCallback) {
        self.shared.queue.request_frame(callback);
        self.shared.wake();
    }
}

impl Drop for FrameLoopHandle {
    fn drop(&mut self) {
        // No join: the last handle may be dropped from inside a frame callback.
        self.stop();
    }
}
