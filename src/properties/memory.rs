//! In-memory property store.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{PropertyChange, PropertySource, RefreshCallback};

/// Concurrent property map with change notification.
///
/// This is the store behind every other source: the poller and the file
/// watcher write into one of these.
#[derive(Default)]
pub struct InMemoryPropertySource {
    values: DashMap<String, String>,
    subscribers: ArcSwap<Vec<RefreshCallback>>,
}

impl InMemoryPropertySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from name/value pairs without notifying anyone.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (k, v) in values {
            store.values.insert(k.into(), v.into());
        }
        store
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted copy of every property, for diagnostics.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut all: Vec<_> = self
            .values
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        all.sort();
        all
    }

    fn notify(&self, name: &str, value: Option<&str>) {
        let subscribers = self.subscribers.load();
        if subscribers.is_empty() {
            return;
        }
        let change = PropertyChange {
            name: name.to_string(),
            value: value.map(str::to_string),
        };
        for callback in subscribers.iter() {
            callback(&change);
        }
    }
}

impl PropertySource for InMemoryPropertySource {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|r| r.value().clone())
    }

    fn set(&self, name: &str, value: &str) {
        let previous = self.values.insert(name.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            tracing::trace!(property = %name, value = %value, "Property set");
            self.notify(name, Some(value));
        }
    }

    fn clear(&self, name: &str) {
        if self.values.remove(name).is_some() {
            tracing::trace!(property = %name, "Property cleared");
            self.notify(name, None);
        }
    }

    fn subscribe(&self, callback: RefreshCallback) {
        self.subscribers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&callback));
            next
        });
    }

    fn set_if_absent(&self, name: &str, value: &str) -> bool {
        let inserted = match self.values.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                true
            }
        };
        if inserted {
            self.notify(name, Some(value));
        }
        inserted
    }
}
