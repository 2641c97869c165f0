//! Applying remote snapshots to the shared store.
//!
//! # Responsibilities
//! - Write every remote value, overwriting registered ones
//! - Remember which names the remote side owns and what it displaced
//! - Put back the displaced value when an owned name vanishes from a later
//!   snapshot, or clear it when nothing was there before
//!
//! # Design Decisions
//! - Remote always wins going forward; registration only ever fills gaps
//! - Dropping a remote value uncovers the registered one, so the layers
//!   stay defaults < registered < remote

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use super::PropertySource;
use crate::observability::metrics;

/// Outcome of one snapshot application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub written: usize,
    pub cleared: usize,
}

/// Bridges remote snapshots into a `PropertySource`.
pub struct RemoteOverrides {
    target: Arc<dyn PropertySource>,
    /// Remote-owned names and the value each one displaced.
    owned: Mutex<HashMap<String, Option<String>>>,
}

impl RemoteOverrides {
    pub fn new(target: Arc<dyn PropertySource>) -> Self {
        Self {
            target,
            owned: Mutex::new(HashMap::new()),
        }
    }

    pub fn target(&self) -> &Arc<dyn PropertySource> {
        &self.target
    }

    /// Apply a full snapshot from `origin` (used for logs and metrics).
    pub fn apply(&self, origin: &str, snapshot: HashMap<String, String>) -> RefreshSummary {
        let mut owned = self.owned.lock().unwrap_or_else(|e| e.into_inner());
        let mut summary = RefreshSummary::default();

        let vanished: Vec<String> = owned
            .keys()
            .filter(|name| !snapshot.contains_key(*name))
            .cloned()
            .collect();
        for name in vanished {
            match owned.remove(&name).flatten() {
                Some(displaced) => self.target.set(&name, &displaced),
                None => self.target.clear(&name),
            }
            summary.cleared += 1;
        }

        for (name, value) in snapshot {
            let current = self.target.get(&name);
            if current.as_deref() != Some(value.as_str()) {
                self.target.set(&name, &value);
                summary.written += 1;
            }
            owned.entry(name).or_insert(current);
        }

        if summary.written > 0 || summary.cleared > 0 {
            tracing::info!(
                origin = %origin,
                written = summary.written,
                cleared = summary.cleared,
                "Applied remote property snapshot"
            );
        } else {
            tracing::debug!(origin = %origin, "Remote property snapshot unchanged");
        }
        metrics::record_property_refresh(origin);

        summary
    }
}

/// Flatten a JSON document into dotted property names.
///
/// Returns `None` when the document is not an object.
pub fn flatten(document: &Value) -> Option<HashMap<String, String>> {
    let Value::Object(root) = document else {
        return None;
    };
    let mut out = HashMap::new();
    flatten_into(root, "", &mut out);
    Some(out)
}

fn flatten_into(obj: &Map<String, Value>, prefix: &str, out: &mut HashMap<String, String>) {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(nested, &name, out),
            Value::Null => {}
            Value::String(s) => {
                out.insert(name, s.clone());
            }
            other => {
                out.insert(name, other.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::InMemoryPropertySource;
    use serde_json::json;

    #[test]
    fn test_remote_overwrites_then_uncovers_registered() {
        let store = Arc::new(InMemoryPropertySource::with_values([("a", "registered"), ("b", "registered")]));
        let remote = RemoteOverrides::new(store.clone());

        let summary = remote.apply("test", HashMap::from([("a".to_string(), "remote".to_string())]));
        assert_eq!(summary, RefreshSummary { written: 1, cleared: 0 });
        assert_eq!(store.get("a").as_deref(), Some("remote"));
        assert_eq!(store.get("b").as_deref(), Some("registered"));

        // a second push must not record its own earlier value as displaced
        remote.apply("test", HashMap::from([("a".to_string(), "remote2".to_string())]));

        let summary = remote.apply("test", HashMap::new());
        assert_eq!(summary, RefreshSummary { written: 0, cleared: 1 });
        assert_eq!(store.get("a").as_deref(), Some("registered"));
        // never owned by the remote side
        assert_eq!(store.get("b").as_deref(), Some("registered"));
    }

    #[test]
    fn test_remote_only_value_is_cleared_when_dropped() {
        let store = Arc::new(InMemoryPropertySource::new());
        let remote = RemoteOverrides::new(store.clone());

        remote.apply("test", HashMap::from([("a".to_string(), "remote".to_string())]));
        let summary = remote.apply("test", HashMap::new());
        assert_eq!(summary, RefreshSummary { written: 0, cleared: 1 });
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_flatten_nested_and_scalars() {
        let doc = json!({
            "resilience.command.A.circuitBreaker.forceOpen": true,
            "resilience": { "threadpool": { "A": { "coreSize": 4 } } },
            "skip": null,
            "name": "x"
        });
        let flat = flatten(&doc).unwrap();
        assert_eq!(flat["resilience.command.A.circuitBreaker.forceOpen"], "true");
        assert_eq!(flat["resilience.threadpool.A.coreSize"], "4");
        assert_eq!(flat["name"], "x");
        assert!(!flat.contains_key("skip"));

        assert!(flatten(&json!([1, 2])).is_none());
    }
}
