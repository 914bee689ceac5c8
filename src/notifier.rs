//! Frame-batched change notification.
//!
//! A burst of writes (keystrokes, IME composition, a pointer drag) should
//! reach dependents as one notification, and not from inside the engine's
//! transaction call stack. The notifier waits for the next frame, then for
//! the frame after it, and only then emits its target signal. One frame alone
//! can still race the UI's reconciliation of the change that triggered it.
//!
//! ```text
//! set  set  set           frame N+1        frame N+2
//!  |----|----|----------------|----------------|--> emit (once)
//!  ^ window opens             (re-requested)
//! ```
//!
//! Requests made while a notification is pending are coalesced into it. The
//! pending flag clears just before the emit, so a write made by a watcher
//! reacting to the notification opens a fresh window.

use crate::Signal;
use crate::arena::SignalId;
use crate::frame::FrameScheduler;
use crate::signal::emit_signal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Frame boundaries a notification waits before it fires.
pub const FRAME_DELAY: u32 = 2;

/// Coalesces change requests into one signal emission per batching window.
///
/// The notifier holds the target's id only. If the [`Signal`] is dropped while
/// a notification is pending, the notification still fires and reaches no one.
pub struct FrameBatchedNotifier {
    target: SignalId,
    frames: Arc<dyn FrameScheduler>,
    state: Arc<WindowState>,
}

#[derive(Default)]
struct WindowState {
    pending: AtomicBool,
    fired: AtomicU64,
}

impl FrameBatchedNotifier {
    /// Create a notifier that emits `target` through `frames`
    pub fn new(target: &Signal, frames: Arc<dyn FrameScheduler>) -> Self {
        Self {
            target: target.node_id(),
            frames,
            state: Arc::new(WindowState::default()),
        }
    }

    /// Ask for a notification.
    ///
    /// Opens a batching window if none is open; otherwise does nothing. Never
    /// emits synchronously.
    pub fn request(&self) {
        if self.state.pending.swap(true, Ordering::AcqRel) {
            cov_mark::hit!(notification_coalesced);
            return;
        }

        tracing::trace!(signal = self.target.index(), "batching window opened");
        wait_frames(
            Arc::clone(&self.frames),
            FRAME_DELAY,
            self.target,
            Arc::clone(&self.state),
        );
    }

    /// Whether a window is open and its notification has not fired yet
    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Number of notifications fired so far.
    ///
    /// Counted after the emit, so once this moves the dependents are queued.
    pub fn notifications_fired(&self) -> u64 {
        self.state.fired.load(Ordering::Acquire)
    }
}

/// Re-request a frame until `remaining` boundaries have passed, then fire
fn wait_frames(
    frames: Arc<dyn FrameScheduler>,
    remaining: u32,
    target: SignalId,
    state: Arc<WindowState>,
) {
    let scheduler = Arc::clone(&frames);
    frames.request_frame(Box::new(move || {
        if remaining > 1 {
            wait_frames(scheduler, remaining - 1, target, state);
            return;
        }
        state.pending.store(false, Ordering::Release);
        emit_signal(target);
        let fired = state.fired.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(signal = target.index(), fired, "batched notification fired");
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameQueue;
    use crate::{Watcher, flush_watchers};
    use std::sync::atomic::AtomicUsize;

    fn watched(signal: &Arc<Signal>) -> (Watcher, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let signal = signal.clone();
        let watcher = Watcher::new(move || {
            signal.track_dependency();
            runs_clone.fetch_add(1, Ordering::Relaxed);
        });
        (watcher, runs)
    }

    #[test]
    fn request_never_emits_synchronously() {
        let frames = Arc::new(FrameQueue::new());
        let signal = Arc::new(Signal::new());
        let (_watcher, runs) = watched(&signal);
        let notifier = FrameBatchedNotifier::new(&signal, frames.clone());

        notifier.request();
        flush_watchers();

        assert_eq!(runs.load(Ordering::Relaxed), 1);
        assert!(notifier.is_pending());
    }

    #[test]
    fn fires_after_second_frame_boundary() {
        let frames = Arc::new(FrameQueue::new());
        let signal = Arc::new(Signal::new());
        let (_watcher, runs) = watched(&signal);
        let notifier = FrameBatchedNotifier::new(&signal, frames.clone());

        notifier.request();

        frames.run_frame();
        flush_watchers();
        assert_eq!(runs.load(Ordering::Relaxed), 1);
        assert_eq!(notifier.notifications_fired(), 0);

        frames.run_frame();
        flush_watchers();
        assert_eq!(runs.load(Ordering::Relaxed), 2);
        assert_eq!(notifier.notifications_fired(), 1);
        assert!(!notifier.is_pending());
    }

    #[test]
    fn waits_exactly_frame_delay_boundaries() {
        let frames = Arc::new(FrameQueue::new());
        let signal = Signal::new();
        let notifier = FrameBatchedNotifier::new(&signal, frames.clone());

        notifier.request();
        let mut boundaries = 0;
        while notifier.notifications_fired() == 0 {
            assert_eq!(frames.run_frame(), 1);
            boundaries += 1;
            assert!(boundaries <= FRAME_DELAY, "notification never fired");
        }

        assert_eq!(boundaries, FRAME_DELAY);
        assert!(frames.is_idle());
    }

    #[test]
    fn requests_within_window_coalesce() {
        let frames = Arc::new(FrameQueue::new());
        let signal = Signal::new();
        let notifier = FrameBatchedNotifier::new(&signal, frames.clone());

        notifier.request();
        {
            cov_mark::check!(notification_coalesced);
            notifier.request();
        }
        frames.run_frame();
        notifier.request();
        assert_eq!(frames.queued_callbacks(), 1);

        frames.run_frame();
        assert_eq!(notifier.notifications_fired(), 1);
        assert!(frames.is_idle());
    }

    #[test]
    fn request_after_firing_opens_new_window() {
        let frames = Arc::new(FrameQueue::new());
        let signal = Signal::new();
        let notifier = FrameBatchedNotifier::new(&signal, frames.clone());

        notifier.request();
        frames.run_frame();
        frames.run_frame();
        notifier.request();
        assert!(notifier.is_pending());

        frames.run_frame();
        frames.run_frame();
        assert_eq!(notifier.notifications_fired(), 2);
    }

    #[test]
    fn firing_after_signal_drop_is_harmless() {
        let frames = Arc::new(FrameQueue::new());
        let signal = Signal::new();
        let notifier = FrameBatchedNotifier::new(&signal, frames.clone());

        notifier.request();
        drop(signal);
        frames.run_frame();
        frames.run_frame();

        assert_eq!(notifier.notifications_fired(), 1);
    }
}
