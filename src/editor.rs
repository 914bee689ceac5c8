//! Reactive wrapper around an imperatively mutated editor engine.
//!
//! [`ReactiveEditor`] owns an engine and two [`ObservableCell`]s, one for the
//! document snapshot and one for the extension storage. After every applied
//! transaction the engine's handler writes both cells; the writes are visible
//! at once and announced to watchers once per batching window.
//!
//! Plugin registration changes the engine state without a transaction, so
//! [`register_plugin`](ReactiveEditor::register_plugin) and
//! [`unregister_plugin`](ReactiveEditor::unregister_plugin) write the state
//! cell themselves before returning.
//!
//! The editor itself is not reactive: it is neither `Clone` nor backed by a
//! signal, and watchers never depend on "the editor", only on its cells and
//! its renderer registry.

use crate::cell::ObservableCell;
use crate::engine::{EditorEngine, TransactionEvent, TransactionHandler};
use crate::frame::FrameScheduler;
use crate::plugin::{PluginRef, PluginResolver};
use crate::renderers::RendererRegistry;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Editor engine plus the reactive state a UI layer renders from.
///
/// `R` is the UI layer's per-node renderer type, `C` the handle of the
/// component that owns the rendered content. Neither is interpreted here.
///
/// `state`, `storage`, `register_plugin` and `unregister_plugin` shadow the
/// engine's operations; every other engine operation is available through
/// `Deref`/`DerefMut`:
///
/// ```ignore
/// let frames = Arc::new(FrameQueue::new());
/// let mut editor: ReactiveEditor<MyEngine> = ReactiveEditor::new(options, frames.clone())?;
///
/// let state = editor.state_cell().cloned().unwrap();
/// let _view = Watcher::new(move || render(&state.get()));
///
/// editor.dispatch(insert_text("hello"))?;   // engine method, via DerefMut
/// frames.run_frame();
/// frames.run_frame();
/// flush_watchers();                          // view re-renders once
/// ```
pub struct ReactiveEditor<E: EditorEngine, R = (), C = ()> {
    engine: E,
    state: Option<ObservableCell<E::State>>,
    storage: Option<ObservableCell<E::Storage>>,
    renderers: Arc<RendererRegistry<R>>,
    content_component: Option<C>,
}

impl<E: EditorEngine, R, C> ReactiveEditor<E, R, C> {
    /// Create the engine from `options` and attach the reactive cells.
    ///
    /// Engine construction errors are returned unchanged.
    pub fn new(options: E::Options, frames: Arc<dyn FrameScheduler>) -> Result<Self, E::Error> {
        let engine = E::create(options)?;
        Ok(Self::from_engine(engine, frames))
    }

    /// Wrap an already constructed engine
    pub fn from_engine(engine: E, frames: Arc<dyn FrameScheduler>) -> Self {
        let mut editor = Self {
            engine,
            state: None,
            storage: None,
            renderers: Arc::new(RendererRegistry::new()),
            content_component: None,
        };
        editor.attach(frames);
        editor
    }

    /// Seed both cells from the engine and subscribe to transactions
    fn attach(&mut self, frames: Arc<dyn FrameScheduler>) {
        let state = ObservableCell::new(self.engine.state(), Arc::clone(&frames));
        let storage = ObservableCell::new(self.engine.storage(), frames);

        let (state_sink, storage_sink) = (state.clone(), storage.clone());
        let handler: TransactionHandler<E::State, E::Storage> =
            Box::new(move |event: TransactionEvent<'_, E::State, E::Storage>| {
                state_sink.set(event.state.clone());
                storage_sink.set(event.storage.clone());
            });
        self.engine.on_transaction(handler);

        self.state = Some(state);
        self.storage = Some(storage);
        tracing::debug!("reactive editor attached");
    }

    /// Latest document snapshot (tracked).
    ///
    /// Falls back to the engine while the cells are not attached yet.
    pub fn state(&self) -> E::State {
        match &self.state {
            Some(cell) => cell.get(),
            None => self.engine.state(),
        }
    }

    /// Latest extension storage (tracked).
    ///
    /// Falls back to the engine while the cells are not attached yet.
    pub fn storage(&self) -> E::Storage {
        match &self.storage {
            Some(cell) => cell.get(),
            None => self.engine.storage(),
        }
    }

    /// Register an engine plugin and publish the reconfigured state at once.
    ///
    /// `resolver` decides how the plugin joins the existing sequence; see
    /// [`PluginResolver`].
    pub fn register_plugin(
        &mut self,
        plugin: E::Plugin,
        resolver: Option<PluginResolver<E::Plugin>>,
    ) -> Result<(), E::Error> {
        self.engine.register_plugin(plugin, resolver)?;
        tracing::debug!("plugin registered");
        self.publish_state();
        Ok(())
    }

    /// Unregister the plugins matching `target` and publish the state at once
    pub fn unregister_plugin<'a>(
        &mut self,
        target: impl Into<PluginRef<'a>>,
    ) -> Result<(), E::Error> {
        let target = target.into();
        self.engine.unregister_plugin(target)?;
        tracing::debug!(%target, "plugin unregistered");
        self.publish_state();
        Ok(())
    }

    fn publish_state(&self) {
        if let Some(cell) = &self.state {
            cell.set(self.engine.state());
        }
    }

    /// The cell holding the document snapshot
    pub fn state_cell(&self) -> Option<&ObservableCell<E::State>> {
        self.state.as_ref()
    }

    /// The cell holding the extension storage
    pub fn storage_cell(&self) -> Option<&ObservableCell<E::Storage>> {
        self.storage.as_ref()
    }

    /// Renderers registered by the UI layer, keyed by identifier
    pub fn renderers(&self) -> &Arc<RendererRegistry<R>> {
        &self.renderers
    }

    /// Component instance currently owning the rendered content
    pub fn content_component(&self) -> Option<&C> {
        self.content_component.as_ref()
    }

    /// Replace the content component handle; returns the previous one
    pub fn set_content_component(&mut self, component: C) -> Option<C> {
        self.content_component.replace(component)
    }

    /// Clear the content component handle (on unmount)
    pub fn take_content_component(&mut self) -> Option<C> {
        self.content_component.take()
    }
}

impl<E: EditorEngine, R, C> Deref for ReactiveEditor<E, R, C> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.engine
    }
}

impl<E: EditorEngine, R, C> DerefMut for ReactiveEditor<E, R, C> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
