//! Plugin identity and the ordered plugin sequence.
//!
//! Engines keep their middleware in an ordered sequence where position is
//! priority. A plugin is identified by a derived unique key: the first key
//! created for a name is `"{name}$"`, later ones `"{name}$1"`, `"{name}$2"`,
//! and so on, process-wide. Removal can target one key exactly, or every
//! plugin created under a name.

use crate::hash::FastHashBuilder;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Per-name count of keys handed out so far
static KEY_COUNTERS: LazyLock<Mutex<HashMap<String, u32, FastHashBuilder>>> =
    LazyLock::new(|| Mutex::new(HashMap::default()));

fn derive_key(name: &str) -> String {
    let mut counters = KEY_COUNTERS.lock();
    match counters.get_mut(name) {
        Some(count) => {
            *count += 1;
            format!("{name}${count}")
        }
        None => {
            counters.insert(name.to_owned(), 0);
            format!("{name}$")
        }
    }
}

/// Unique identity of a plugin inside an engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PluginKey {
    name: Arc<str>,
    key: Arc<str>,
}

impl PluginKey {
    /// Create a key with a fresh unique name derived from `name`
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            key: Arc::from(derive_key(name)),
        }
    }

    /// The name the key was created from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The derived unique key
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Removal target: a plugin name or one specific key.
#[derive(Clone, Copy, Debug)]
pub enum PluginRef<'a> {
    /// Every plugin whose key was derived from this name
    Name(&'a str),
    /// Exactly the plugin holding this key. Unlike `Name`, this is an exact
    /// match, never a prefix match.
    Key(&'a PluginKey),
}

impl PluginRef<'_> {
    /// Whether a plugin with the derived key `key` is targeted
    pub fn matches(&self, key: &str) -> bool {
        match self {
            PluginRef::Name(name) => key
                .strip_prefix(*name)
                .is_some_and(|rest| rest.starts_with('$')),
            PluginRef::Key(target) => target.key() == key,
        }
    }
}

impl<'a> From<&'a str> for PluginRef<'a> {
    fn from(name: &'a str) -> Self {
        PluginRef::Name(name)
    }
}

impl<'a> From<&'a String> for PluginRef<'a> {
    fn from(name: &'a String) -> Self {
        PluginRef::Name(name)
    }
}

impl<'a> From<&'a PluginKey> for PluginRef<'a> {
    fn from(key: &'a PluginKey) -> Self {
        PluginRef::Key(key)
    }
}

impl fmt::Display for PluginRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginRef::Name(name) => write!(f, "{name}$*"),
            PluginRef::Key(key) => write!(f, "{key}"),
        }
    }
}

/// A plugin that exposes its derived key.
pub trait KeyedPlugin {
    /// The plugin's derived unique key (see [`PluginKey::key`])
    fn key(&self) -> &str;
}

/// Conflict resolver for plugin registration.
///
/// Receives the new plugin and a copy of the current sequence; returns the
/// sequence to install.
pub type PluginResolver<P> = Box<dyn FnOnce(P, Vec<P>) -> Vec<P> + Send>;

/// Ordered plugin sequence with the usual engine semantics.
///
/// Registration appends (lowest priority) unless a resolver decides
/// otherwise; unregistration removes every match and keeps the order of the
/// rest. Engines can use it as their plugin state directly.
#[derive(Clone, Debug)]
pub struct PluginSet<P> {
    plugins: Vec<P>,
}

impl<P> Default for PluginSet<P> {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }
}

impl<P: KeyedPlugin + Clone> PluginSet<P> {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `plugin`, letting `resolver` rearrange the sequence if given
    pub fn register(&mut self, plugin: P, resolver: Option<PluginResolver<P>>) {
        match resolver {
            Some(resolver) => self.plugins = resolver(plugin, self.plugins.clone()),
            None => self.plugins.push(plugin),
        }
    }

    /// Remove every plugin matching `target`; returns how many were removed
    pub fn unregister(&mut self, target: PluginRef<'_>) -> usize {
        let before = self.plugins.len();
        self.plugins.retain(|plugin| !target.matches(plugin.key()));
        before - self.plugins.len()
    }

    /// Whether any plugin matches `target`
    pub fn contains(&self, target: PluginRef<'_>) -> bool {
        self.plugins.iter().any(|plugin| target.matches(plugin.key()))
    }

    /// Keys in priority order
    pub fn keys(&self) -> Vec<&str> {
        self.plugins.iter().map(KeyedPlugin::key).collect()
    }

    /// Plugins in priority order
    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.plugins.iter()
    }

    /// Plugins in priority order, as a slice
    pub fn as_slice(&self) -> &[P] {
        &self.plugins
    }

    /// Number of plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl<'a, P> IntoIterator for &'a PluginSet<P> {
    type Item = &'a P;
    type IntoIter = std::slice::Iter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.plugins.iter()
    }
}
