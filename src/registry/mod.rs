//! Configuration registry.
//!
//! # Data Flow
//! ```text
//! Application factory → HashMap<DependencyKey, ResilienceConfiguration>
//!     → register(): flatten each entry to properties
//!     → PropertySource::set_if_absent() (never overwrites)
//!
//! resolve(key):
//!     PropertySource::get() per field
//!     → parse + range check, compiled default on miss
//!     → ResilienceConfiguration snapshot
//! ```
//!
//! # Design Decisions
//! - Pure read-through: no private cache, two resolves may differ if a
//!   refresh lands between them
//! - Precedence is defaults < registered < remote; registration only fills
//!   properties nobody has written yet
//! - Unknown keys resolve to all defaults, never an error

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::dependency::{
    CircuitBreakerSettings, DependencyKey, IsolationStrategy, ResilienceConfiguration,
    SemaphoreSettings, ThreadPoolSettings,
};
use crate::properties::{PropertyNames, PropertySource};

/// Owns the default → registered → remote merge for every dependency.
pub struct ConfigurationRegistry {
    source: Arc<dyn PropertySource>,
    registered: RwLock<BTreeSet<DependencyKey>>,
}

impl ConfigurationRegistry {
    pub fn new(source: Arc<dyn PropertySource>) -> Self {
        Self {
            source,
            registered: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn source(&self) -> &Arc<dyn PropertySource> {
        &self.source
    }

    /// Push application values into the property source.
    ///
    /// Returns how many properties were actually written; the rest were
    /// already held by the source and left untouched.
    pub fn register(&self, entries: &HashMap<DependencyKey, ResilienceConfiguration>) -> usize {
        let mut written = 0;
        for (key, config) in entries {
            for (name, value) in to_properties(key, config) {
                if self.source.set_if_absent(&name, &value) {
                    written += 1;
                } else {
                    tracing::debug!(
                        key = %key,
                        property = %name,
                        "Property already set, registration left it untouched"
                    );
                }
            }
        }

        let mut registered = self.registered.write().unwrap_or_else(|e| e.into_inner());
        registered.extend(entries.keys().cloned());

        tracing::info!(
            keys = entries.len(),
            properties_written = written,
            "Registered dependency configuration"
        );
        written
    }

    /// Build the entries with an application factory, then register them.
    pub fn register_with<F>(&self, factory: F) -> usize
    where
        F: FnOnce() -> HashMap<DependencyKey, ResilienceConfiguration>,
    {
        self.register(&factory())
    }

    /// Keys registered so far, sorted by name.
    pub fn keys(&self) -> Vec<DependencyKey> {
        let registered = self.registered.read().unwrap_or_else(|e| e.into_inner());
        registered.iter().cloned().collect()
    }

    /// Effective configuration for `key` as currently visible.
    pub fn resolve(&self, key: &DependencyKey) -> ResilienceConfiguration {
        let names = PropertyNames::for_key(key);
        let defaults = ResilienceConfiguration::default();
        let reader = FieldReader {
            source: self.source.as_ref(),
            key,
        };

        let d = defaults.thread_pool();
        let max_queue_size = reader.read_checked(&names.max_queue_size(), d.max_queue_size(), |v| *v >= -1);
        let thread_pool = ThreadPoolSettings::new(
            reader.read(&names.core_size(), d.core_size()),
            reader.read(&names.keep_alive_minutes(), d.keep_alive_minutes()),
            max_queue_size,
            reader.read(&names.queue_rejection_threshold(), d.queue_rejection_threshold()),
            reader.read(&names.threadpool_metrics_window(), d.metrics_window_ms()),
            reader.read(&names.threadpool_metrics_buckets(), d.metrics_window_buckets()),
        )
        .unwrap_or(*d);

        let d = defaults.circuit_breaker();
        let circuit_breaker = CircuitBreakerSettings::new(
            reader.read(&names.request_volume_threshold(), d.request_volume_threshold()),
            reader.read(&names.sleep_window(), d.sleep_window_ms()),
            reader.read_checked(&names.error_threshold_percentage(), d.error_threshold_percent(), |v| {
                *v <= 100
            }),
            reader.read(&names.command_metrics_window(), d.metrics_window_ms()),
            reader.read(&names.command_metrics_buckets(), d.metrics_window_buckets()),
        )
        .unwrap_or(*d);

        let d = defaults.semaphore();
        let semaphore = SemaphoreSettings::new(
            reader.read(&names.semaphore_max_concurrent(), d.max_concurrent_requests()),
            reader.read(&names.fallback_max_concurrent(), d.fallback_max_concurrent_requests()),
        );

        ResilienceConfiguration::new(
            thread_pool,
            circuit_breaker,
            semaphore,
            reader.read(&names.execution_timeout(), defaults.execution_timeout_ms()),
            reader.read::<IsolationStrategy>(&names.isolation_strategy(), defaults.isolation_strategy()),
        )
    }
}

/// Flatten one configuration into its property names and values.
pub fn to_properties(key: &DependencyKey, config: &ResilienceConfiguration) -> Vec<(String, String)> {
    let names = PropertyNames::for_key(key);
    let tp = config.thread_pool();
    let cb = config.circuit_breaker();
    let sem = config.semaphore();

    vec![
        (names.isolation_strategy(), config.isolation_strategy().to_string()),
        (names.execution_timeout(), config.execution_timeout_ms().to_string()),
        (names.semaphore_max_concurrent(), sem.max_concurrent_requests().to_string()),
        (names.fallback_max_concurrent(), sem.fallback_max_concurrent_requests().to_string()),
        (names.request_volume_threshold(), cb.request_volume_threshold().to_string()),
        (names.sleep_window(), cb.sleep_window_ms().to_string()),
        (names.error_threshold_percentage(), cb.error_threshold_percent().to_string()),
        (names.command_metrics_window(), cb.metrics_window_ms().to_string()),
        (names.command_metrics_buckets(), cb.metrics_window_buckets().to_string()),
        (names.core_size(), tp.core_size().to_string()),
        (names.keep_alive_minutes(), tp.keep_alive_minutes().to_string()),
        (names.max_queue_size(), tp.max_queue_size().to_string()),
        (names.queue_rejection_threshold(), tp.queue_rejection_threshold().to_string()),
        (names.threadpool_metrics_window(), tp.metrics_window_ms().to_string()),
        (names.threadpool_metrics_buckets(), tp.metrics_window_buckets().to_string()),
    ]
}

struct FieldReader<'a> {
    source: &'a dyn PropertySource,
    key: &'a DependencyKey,
}

impl FieldReader<'_> {
    fn read<T>(&self, name: &str, default: T) -> T
    where
        T: FromStr + Display + Copy,
    {
        self.read_checked(name, default, |_| true)
    }

    fn read_checked<T>(&self, name: &str, default: T, in_range: impl Fn(&T) -> bool) -> T
    where
        T: FromStr + Display + Copy,
    {
        let Some(raw) = self.source.get(name) else {
            return default;
        };
        match raw.trim().parse::<T>() {
            Ok(value) if in_range(&value) => value,
            _ => {
                tracing::warn!(
                    key = %self.key,
                    property = %name,
                    value = %raw,
                    default = %default,
                    "Invalid property value, using default"
                );
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::InMemoryPropertySource;

    fn key(name: &str) -> DependencyKey {
        DependencyKey::new(name).unwrap()
    }

    fn custom() -> ResilienceConfiguration {
        ResilienceConfiguration::new(
            ThreadPoolSettings::new(4, 2, 50, 20, 20_000, 20).unwrap(),
            CircuitBreakerSettings::new(5, 1_500, 25, 5_000, 5).unwrap(),
            SemaphoreSettings::new(3, 2),
            250,
            IsolationStrategy::Semaphore,
        )
    }

    #[test]
    fn test_unknown_key_resolves_to_defaults() {
        let registry = ConfigurationRegistry::new(Arc::new(InMemoryPropertySource::new()));
        assert_eq!(registry.resolve(&key("nobody")), ResilienceConfiguration::default());
    }

    #[test]
    fn test_register_then_resolve_round_trips() {
        let registry = ConfigurationRegistry::new(Arc::new(InMemoryPropertySource::new()));
        let written = registry.register(&HashMap::from([(key("payments"), custom())]));
        assert_eq!(written, 15);
        assert_eq!(registry.resolve(&key("PAYMENTS")), custom());
        assert_eq!(registry.keys(), vec![key("PAYMENTS")]);
    }

    #[test]
    fn test_register_never_overwrites_existing_property() {
        let store = Arc::new(InMemoryPropertySource::with_values([(
            "resilience.command.PAYMENTS.execution.isolation.thread.timeoutInMilliseconds",
            "9000",
        )]));
        let registry = ConfigurationRegistry::new(store.clone());
        registry.register(&HashMap::from([(key("payments"), custom())]));

        let resolved = registry.resolve(&key("payments"));
        assert_eq!(resolved.execution_timeout_ms(), 9000);
        assert_eq!(resolved.thread_pool().core_size(), 4);
    }

    #[test]
    fn test_remote_write_after_register_wins() {
        let store = Arc::new(InMemoryPropertySource::new());
        let registry = ConfigurationRegistry::new(store.clone());
        registry.register(&HashMap::from([(key("payments"), custom())]));

        store.set("resilience.threadpool.PAYMENTS.coreSize", "32");
        assert_eq!(registry.resolve(&key("payments")).thread_pool().core_size(), 32);
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = ConfigurationRegistry::new(Arc::new(InMemoryPropertySource::new()));
        let entries = HashMap::from([(key("a"), custom())]);
        assert_eq!(registry.register(&entries), 15);
        assert_eq!(registry.register_with(|| entries.clone()), 0);
        assert_eq!(registry.resolve(&key("a")), custom());
    }

    #[test]
    fn test_invalid_remote_values_fall_back_per_field() {
        let store = Arc::new(InMemoryPropertySource::with_values([
            ("resilience.threadpool.A.maxQueueSize", "-7"),
            ("resilience.command.A.circuitBreaker.errorThresholdPercentage", "140"),
            ("resilience.threadpool.A.coreSize", "lots"),
            ("resilience.command.A.execution.isolation.strategy", "semaphore"),
            ("resilience.command.A.circuitBreaker.sleepWindowInMilliseconds", " 100 "),
        ]));
        let registry = ConfigurationRegistry::new(store);
        let resolved = registry.resolve(&key("a"));

        assert_eq!(resolved.thread_pool().max_queue_size(), -1);
        assert_eq!(resolved.circuit_breaker().error_threshold_percent(), 50);
        assert_eq!(resolved.thread_pool().core_size(), 10);
        assert_eq!(resolved.isolation_strategy(), IsolationStrategy::Semaphore);
        assert_eq!(resolved.circuit_breaker().sleep_window_ms(), 100);
    }
}
