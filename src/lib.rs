#![deny(missing_docs)]

//! Frame-batched reactivity for UIs rendering an imperative editor engine.
//!
//! An editor engine applies transactions and produces a new immutable state
//! snapshot after each one. A UI wants to read the latest snapshot at any
//! time, but re-render at most once per burst of edits, and never from inside
//! the engine's own call stack. This crate bridges the two.
//!
//! # Quick Start
//!
//! ```ignore
//! use reaktiv_bridge::{FrameQueue, ReactiveEditor, Watcher, flush_watchers};
//!
//! let frames = Arc::new(FrameQueue::new());
//! let mut editor: ReactiveEditor<MyEngine> = ReactiveEditor::new(options, frames.clone())?;
//!
//! // Re-renders whenever the state cell announces a change
//! let state = editor.state_cell().cloned().unwrap();
//! let _view = Watcher::new(move || render(&state.get()));
//!
//! // A burst of ten transactions...
//! for _ in 0..10 {
//!     editor.dispatch(type_key())?;
//! }
//! assert_eq!(editor.state().version(), 10);  // ...is readable right away
//!
//! frames.run_frame();
//! frames.run_frame();
//! flush_watchers();                          // ...and renders once
//! ```
//!
//! # Core Types
//!
//! - [`ReactiveEditor`] - Owns the engine, keeps its state and storage cells current.
//! - [`ObservableCell<T>`] - Value slot: immediate writes, frame-batched notifications.
//! - [`FrameBatchedNotifier`] - Coalesces change requests into one emission per window.
//! - [`FrameScheduler`] - Host capability: run a callback at the next frame boundary.
//! - [`Watcher`] - Reactive dependent. Re-runs after the values it read change.
//! - [`Signal`] - Lightweight reactive marker underneath all of the above.
//! - [`RendererRegistry`] - Observable map of UI renderers.
//!
//! # Timing
//!
//! ```text
//! engine transaction ──► cell.set() ──► value visible immediately
//!                                 └──► notifier: wait frame, wait frame ──► signal emits
//!                                                                             │
//!                              flush_watchers() ◄── host paint loop ◄─────────┘
//! ```
//!
//! Writes in one window share one notification. Plugin registration writes
//! the state cell before returning, so it never reads stale.
//!
//! # Frame Sources
//!
//! ```ignore
//! // Host paint loop drives frames
//! let frames = Arc::new(FrameQueue::new());
//! frames.run_frame();
//!
//! // No paint callback available: fixed-interval thread
//! let frames = Arc::new(FrameLoop::new().interval(Duration::from_millis(16)).spawn());
//! ```

// Internal modules
pub(crate) mod arena;
mod cell;
mod editor;
mod engine;
mod frame;
mod hash;
mod notifier;
mod plugin;
mod renderers;
mod signal;
mod watcher;

// Bridge
pub use editor::ReactiveEditor;
pub use engine::{EditorEngine, TransactionEvent, TransactionHandler};
pub use plugin::{KeyedPlugin, PluginKey, PluginRef, PluginResolver, PluginSet};
pub use renderers::RendererRegistry;

// Reactive primitives
pub use cell::ObservableCell;
pub use hash::FastHashBuilder;
pub use notifier::{FRAME_DELAY, FrameBatchedNotifier};
pub use signal::Signal;
pub use watcher::{Watcher, flush_watchers, is_flush_scheduled, untracked};

// Frame scheduling
pub use frame::{
    DEFAULT_FRAME_INTERVAL, FrameCallback, FrameLoop, FrameLoopHandle, FrameQueue, FrameScheduler,
};
