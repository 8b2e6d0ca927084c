//! The typed, prefix-namespaced argument bag carried by mutations and handler events.
//!
//! Keys are namespaced (`"layer.field"`) so multiple collaborators can
//! attach arguments to the same mutation without colliding. Values are
//! split into transport-safe (JSON, always serializable) and
//! transport-local (references, channels, callbacks — stripped when a
//! mutation crosses a process boundary, e.g. into the REPL wire format).

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A mutation/event argument bag. Clone is cheap (JSON values + `Arc`s).
#[derive(Debug, Clone, Default)]
pub struct ArgBag {
    transportable: BTreeMap<String, serde_json::Value>,
    local: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ArgBag {
    /// An empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace a key as `"{prefix}.{key}"`, the convention every caller
    /// in this crate is expected to follow to avoid collisions.
    pub fn namespaced(prefix: &str, key: &str) -> String {
        format!("{prefix}.{key}")
    }

    /// Set a transport-safe (JSON) value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.transportable.insert(key.into(), v);
        }
    }

    /// Read a transport-safe value back out, deserializing into `T`.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.transportable
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Raw JSON access, for callers that don't want to deserialize.
    pub fn get_json(&self, key: &str) -> Option<&serde_json::Value> {
        self.transportable.get(key)
    }

    /// Set a transport-local value — a reference, channel, or callback
    /// that cannot cross a process boundary. Stripped by [`ArgBag::to_transportable`].
    pub fn set_local<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.local.insert(key.into(), Arc::new(value));
    }

    /// Read a transport-local value back out by downcasting.
    pub fn get_local<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.local
            .get(key)
            .and_then(|v| Arc::clone(v).downcast::<T>().ok())
    }

    /// All keys under `prefix.` (namespace), with the namespace stripped.
    pub fn under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a serde_json::Value)> {
        let needle = format!("{prefix}.");
        self.transportable.iter().filter_map(move |(k, v)| {
            k.strip_prefix(needle.as_str()).map(|rest| (rest, v))
        })
    }

    /// A copy of this bag with every transport-local field stripped —
    /// what crosses the REPL wire or a process boundary.
    pub fn to_transportable(&self) -> TransportArgs {
        TransportArgs(self.transportable.clone())
    }
}

/// The process-boundary-safe projection of an [`ArgBag`] — plain JSON,
/// serializable, no local references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportArgs(BTreeMap<String, serde_json::Value>);

impl TransportArgs {
    /// Rehydrate into an [`ArgBag`] with no local fields set.
    pub fn into_arg_bag(self) -> ArgBag {
        ArgBag {
            transportable: self.0,
            local: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_fields_stripped_on_transport() {
        let mut bag = ArgBag::new();
        bag.set("layer.count", 3u32);
        bag.set_local("layer.callback", || 42);
        let transport = bag.to_transportable();
        assert_eq!(transport.0.len(), 1);
        assert_eq!(bag.get::<u32>("layer.count"), Some(3));
    }

    #[test]
    fn namespacing_avoids_collision() {
        let mut bag = ArgBag::new();
        bag.set(ArgBag::namespaced("loop", "max_turns"), 5u32);
        bag.set(ArgBag::namespaced("ui", "max_turns"), 10u32);
        assert_eq!(bag.get::<u32>("loop.max_turns"), Some(5));
        assert_eq!(bag.get::<u32>("ui.max_turns"), Some(10));
    }
}
