//! Boundary to the external editor engine.
//!
//! The engine owns the document, applies transactions, keeps the plugin
//! sequence and the extension storage. The bridge only needs the handful of
//! operations below; everything else stays on the engine and is reached
//! through the bridge's `Deref`.

use crate::plugin::{PluginRef, PluginResolver};

/// Payload handed to transaction handlers once a transaction is applied.
#[derive(Debug)]
pub struct TransactionEvent<'a, S, G> {
    /// Snapshot produced by the transaction
    pub state: &'a S,
    /// Extension storage after the transaction
    pub storage: &'a G,
}

// Manual impls: derive would require S: Copy and G: Copy.
impl<S, G> Clone for TransactionEvent<'_, S, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, G> Copy for TransactionEvent<'_, S, G> {}

/// Handler registered for the engine's "transaction completed" event.
pub type TransactionHandler<S, G> = Box<dyn FnMut(TransactionEvent<'_, S, G>) + Send>;

/// The operations the bridge consumes from an imperatively mutated editor engine.
///
/// All methods run synchronously to completion. Errors are the engine's own
/// and travel through the bridge untouched.
pub trait EditorEngine: Sized + Send + 'static {
    /// Construction options
    type Options;
    /// Immutable document snapshot. Expected to be a cheap handle (e.g. `Arc`).
    type State: Clone + Send + Sync + 'static;
    /// Extension storage handle. Shared by reference, so clones must alias
    /// the same storage (e.g. `Arc<RwLock<..>>`).
    type Storage: Clone + Send + Sync + 'static;
    /// Middleware unit kept in the engine's ordered plugin sequence
    type Plugin;
    /// Engine error
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build an engine instance
    fn create(options: Self::Options) -> Result<Self, Self::Error>;

    /// Current document snapshot
    fn state(&self) -> Self::State;

    /// Current extension storage
    fn storage(&self) -> Self::Storage;

    /// Register a handler run after every applied transaction, including ones
    /// dispatched by plugins
    fn on_transaction(&mut self, handler: TransactionHandler<Self::State, Self::Storage>);

    /// Insert `plugin` into the plugin sequence and reconfigure the state.
    ///
    /// `resolver` decides the resulting sequence when given.
    fn register_plugin(
        &mut self,
        plugin: Self::Plugin,
        resolver: Option<PluginResolver<Self::Plugin>>,
    ) -> Result<(), Self::Error>;

    /// Remove the plugins matching `target` and reconfigure the state
    fn unregister_plugin(&mut self, target: PluginRef<'_>) -> Result<(), Self::Error>;
}
