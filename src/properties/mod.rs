//! Dynamic property source subsystem.
//!
//! # Data Flow
//! ```text
//! Startup registration (registry):
//!     set_if_absent() per property        → never overwrites
//!
//! Remote refresh:
//!     polling.rs  (HTTP, on an interval)  ┐
//!     watcher.rs  (overrides file, notify)┴→ remote.rs (apply snapshot, remote wins)
//!
//! Admin force-state (circuit):
//!     set()/clear() on circuitBreaker.force* properties
//!
//! Readers (registry resolve, engine admission):
//!     get() → whatever is currently visible
//! ```
//!
//! # Design Decisions
//! - Injected trait object, never a global
//! - No global lock; last write wins per property name
//! - Subscribers are told about every changed name

pub mod backoff;
pub mod memory;
pub mod names;
pub mod polling;
pub mod remote;
pub mod watcher;

use std::sync::Arc;

pub use memory::InMemoryPropertySource;
pub use names::PropertyNames;
pub use polling::{FetchError, FileFetcher, HttpFetcher, PollingPropertySource, PropertyFetcher};
pub use remote::RemoteOverrides;
pub use watcher::PropertyFileWatcher;

/// A single property change delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub name: String,
    /// New value, `None` when the property was cleared.
    pub value: Option<String>,
}

/// Callback invoked after a property changes.
pub type RefreshCallback = Arc<dyn Fn(&PropertyChange) + Send + Sync>;

/// Process-wide, remotely refreshable key/value store.
pub trait PropertySource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;

    fn set(&self, name: &str, value: &str);

    fn clear(&self, name: &str);

    fn subscribe(&self, callback: RefreshCallback);

    /// Write `value` only when `name` holds nothing yet. Returns whether the
    /// write happened.
    fn set_if_absent(&self, name: &str, value: &str) -> bool {
        if self.get(name).is_some() {
            return false;
        }
        self.set(name, value);
        true
    }
}

impl dyn PropertySource {
    /// Read `name` parsed as `T`, falling back to `default` when the property
    /// is absent or unparseable.
    pub fn get_or<T: std::str::FromStr>(&self, name: &str, default: T) -> T {
        self.get(name)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Read a boolean flag; absent or garbage reads as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).as_deref().and_then(parse_flag).unwrap_or(false)
    }
}

/// Parse a boolean property the way config UIs write them.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
