//! Dependency identity.
//!
//! # Responsibilities
//! - Name one isolated dependency (an external call or slow operation)
//! - Normalize case so `payments` and `PAYMENTS` are the same key
//! - Let the application decide which names exist via a `KeyFactory`

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error returned when a string cannot become a `DependencyKey`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("dependency key is empty")]
    Empty,
    #[error("dependency key {0:?} contains {1:?}; only ASCII letters, digits, '_' and '-' are allowed")]
    InvalidChar(String, char),
}

/// Case-normalized identifier of one isolated dependency.
///
/// Cloning is cheap; equality and hashing only look at the normalized name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyKey(Arc<str>);

impl DependencyKey {
    /// Parse and normalize a key name.
    pub fn new(name: &str) -> Result<Self, KeyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KeyError::Empty);
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(KeyError::InvalidChar(name.to_string(), c));
        }
        Ok(Self(Arc::from(name.to_ascii_uppercase())))
    }

    /// The normalized name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl FromStr for DependencyKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DependencyKey({})", self.0)
    }
}

impl Serialize for DependencyKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DependencyKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Turns externally supplied names (URL segments, config tables) into keys.
pub trait KeyFactory: Send + Sync {
    /// Returns `None` when the application does not know the name.
    fn from_name(&self, name: &str) -> Option<DependencyKey>;
}

/// A closed, enum-like set of keys declared up front.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyFactory {
    keys: BTreeSet<DependencyKey>,
}

impl StaticKeyFactory {
    pub fn new(keys: impl IntoIterator<Item = DependencyKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// All declared keys, sorted by name.
    pub fn keys(&self) -> Vec<DependencyKey> {
        self.keys.iter().cloned().collect()
    }
}

impl KeyFactory for StaticKeyFactory {
    fn from_name(&self, name: &str) -> Option<DependencyKey> {
        let key = DependencyKey::new(name).ok()?;
        self.keys.contains(&key).then_some(key)
    }
}

/// Accepts any syntactically valid name.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenKeyFactory;

impl KeyFactory for OpenKeyFactory {
    fn from_name(&self, name: &str) -> Option<DependencyKey> {
        DependencyKey::new(name).ok()
    }
}
