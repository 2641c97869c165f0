//! Per-dependency resilience configuration.
//!
//! `ResilienceConfiguration` is the value registered for, resolved for and
//! reported for a dependency key. Every part is validated when it is built,
//! whether through the constructors or through serde, so a value that
//! exists is always in range. Out-of-range input is rejected, never clamped.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error for configuration values outside their documented range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        expected: &'static str,
    },
    #[error("unknown isolation strategy {0:?} (expected THREAD or SEMAPHORE)")]
    UnknownIsolation(String),
}

/// How an execution is bulkheaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationStrategy {
    /// Run on a bounded worker set, abandoning the work on timeout.
    #[default]
    Thread,
    /// Run on the caller's task behind a counting permit.
    Semaphore,
}

impl IsolationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thread => "THREAD",
            Self::Semaphore => "SEMAPHORE",
        }
    }
}

impl fmt::Display for IsolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationStrategy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "THREAD" => Ok(Self::Thread),
            "SEMAPHORE" => Ok(Self::Semaphore),
            _ => Err(ConfigurationError::UnknownIsolation(s.to_string())),
        }
    }
}

/// Thread-pool bulkhead settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawThreadPool")]
pub struct ThreadPoolSettings {
    core_size: u32,
    keep_alive_minutes: u32,
    max_queue_size: i32,
    queue_rejection_threshold: u32,
    metrics_window_ms: u64,
    metrics_window_buckets: u32,
}

impl ThreadPoolSettings {
    /// `max_queue_size` of `-1` disables queueing: work is handed directly
    /// to an idle worker or rejected.
    pub fn new(
        core_size: u32,
        keep_alive_minutes: u32,
        max_queue_size: i32,
        queue_rejection_threshold: u32,
        metrics_window_ms: u64,
        metrics_window_buckets: u32,
    ) -> Result<Self, ConfigurationError> {
        if max_queue_size < -1 {
            return Err(ConfigurationError::OutOfRange {
                field: "threadPool.maxQueueSize",
                value: i64::from(max_queue_size),
                expected: ">= -1",
            });
        }
        Ok(Self {
            core_size,
            keep_alive_minutes,
            max_queue_size,
            queue_rejection_threshold,
            metrics_window_ms,
            metrics_window_buckets,
        })
    }

    pub fn core_size(&self) -> u32 {
        self.core_size
    }

    pub fn keep_alive_minutes(&self) -> u32 {
        self.keep_alive_minutes
    }

    pub fn max_queue_size(&self) -> i32 {
        self.max_queue_size
    }

    pub fn queue_rejection_threshold(&self) -> u32 {
        self.queue_rejection_threshold
    }

    pub fn metrics_window_ms(&self) -> u64 {
        self.metrics_window_ms
    }

    pub fn metrics_window_buckets(&self) -> u32 {
        self.metrics_window_buckets
    }

    /// Number of callers allowed to wait for a worker; `None` when queueing
    /// is disabled.
    pub fn effective_queue_limit(&self) -> Option<usize> {
        if self.max_queue_size < 0 {
            return None;
        }
        let physical = self.max_queue_size as usize;
        Some(physical.min(self.queue_rejection_threshold as usize))
    }
}

impl Default for ThreadPoolSettings {
    fn default() -> Self {
        Self {
            core_size: 10,
            keep_alive_minutes: 1,
            max_queue_size: -1,
            queue_rejection_threshold: 5,
            metrics_window_ms: 10_000,
            metrics_window_buckets: 10,
        }
    }
}

#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct RawThreadPool {
    core_size: u32,
    keep_alive_minutes: u32,
    max_queue_size: i32,
    queue_rejection_threshold: u32,
    metrics_window_ms: u64,
    metrics_window_buckets: u32,
}

impl Default for RawThreadPool {
    fn default() -> Self {
        let d = ThreadPoolSettings::default();
        Self {
            core_size: d.core_size,
            keep_alive_minutes: d.keep_alive_minutes,
            max_queue_size: d.max_queue_size,
            queue_rejection_threshold: d.queue_rejection_threshold,
            metrics_window_ms: d.metrics_window_ms,
            metrics_window_buckets: d.metrics_window_buckets,
        }
    }
}

impl TryFrom<RawThreadPool> for ThreadPoolSettings {
    type Error = ConfigurationError;

    fn try_from(raw: RawThreadPool) -> Result<Self, Self::Error> {
        Self::new(
            raw.core_size,
            raw.keep_alive_minutes,
            raw.max_queue_size,
            raw.queue_rejection_threshold,
            raw.metrics_window_ms,
            raw.metrics_window_buckets,
        )
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawCircuitBreaker")]
pub struct CircuitBreakerSettings {
    request_volume_threshold: u32,
    sleep_window_ms: u64,
    error_threshold_percent: u32,
    metrics_window_ms: u64,
    metrics_window_buckets: u32,
}

impl CircuitBreakerSettings {
    pub fn new(
        request_volume_threshold: u32,
        sleep_window_ms: u64,
        error_threshold_percent: u32,
        metrics_window_ms: u64,
        metrics_window_buckets: u32,
    ) -> Result<Self, ConfigurationError> {
        if error_threshold_percent > 100 {
            return Err(ConfigurationError::OutOfRange {
                field: "circuitBreaker.errorThresholdPercent",
                value: i64::from(error_threshold_percent),
                expected: "0..=100",
            });
        }
        Ok(Self {
            request_volume_threshold,
            sleep_window_ms,
            error_threshold_percent,
            metrics_window_ms,
            metrics_window_buckets,
        })
    }

    /// Minimum calls in the window before the breaker may trip.
    pub fn request_volume_threshold(&self) -> u32 {
        self.request_volume_threshold
    }

    pub fn sleep_window_ms(&self) -> u64 {
        self.sleep_window_ms
    }

    pub fn sleep_window(&self) -> Duration {
        Duration::from_millis(self.sleep_window_ms)
    }

    pub fn error_threshold_percent(&self) -> u32 {
        self.error_threshold_percent
    }

    pub fn metrics_window_ms(&self) -> u64 {
        self.metrics_window_ms
    }

    pub fn metrics_window_buckets(&self) -> u32 {
        self.metrics_window_buckets
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            request_volume_threshold: 20,
            sleep_window_ms: 5_000,
            error_threshold_percent: 50,
            metrics_window_ms: 10_000,
            metrics_window_buckets: 10,
        }
    }
}

#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct RawCircuitBreaker {
    request_volume_threshold: u32,
    sleep_window_ms: u64,
    error_threshold_percent: u32,
    metrics_window_ms: u64,
    metrics_window_buckets: u32,
}

impl Default for RawCircuitBreaker {
    fn default() -> Self {
        let d = CircuitBreakerSettings::default();
        Self {
            request_volume_threshold: d.request_volume_threshold,
            sleep_window_ms: d.sleep_window_ms,
            error_threshold_percent: d.error_threshold_percent,
            metrics_window_ms: d.metrics_window_ms,
            metrics_window_buckets: d.metrics_window_buckets,
        }
    }
}

impl TryFrom<RawCircuitBreaker> for CircuitBreakerSettings {
    type Error = ConfigurationError;

    fn try_from(raw: RawCircuitBreaker) -> Result<Self, Self::Error> {
        Self::new(
            raw.request_volume_threshold,
            raw.sleep_window_ms,
            raw.error_threshold_percent,
            raw.metrics_window_ms,
            raw.metrics_window_buckets,
        )
    }
}

/// Semaphore bulkhead limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SemaphoreSettings {
    max_concurrent_requests: u32,
    fallback_max_concurrent_requests: u32,
}

impl SemaphoreSettings {
    pub fn new(max_concurrent_requests: u32, fallback_max_concurrent_requests: u32) -> Self {
        Self {
            max_concurrent_requests,
            fallback_max_concurrent_requests,
        }
    }

    pub fn max_concurrent_requests(&self) -> u32 {
        self.max_concurrent_requests
    }

    pub fn fallback_max_concurrent_requests(&self) -> u32 {
        self.fallback_max_concurrent_requests
    }
}

impl Default for SemaphoreSettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            fallback_max_concurrent_requests: 10,
        }
    }
}

/// Everything the engine needs to isolate one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ResilienceConfiguration {
    thread_pool: ThreadPoolSettings,
    circuit_breaker: CircuitBreakerSettings,
    semaphore: SemaphoreSettings,
    execution_timeout_ms: u64,
    isolation_strategy: IsolationStrategy,
}

impl Default for ResilienceConfiguration {
    fn default() -> Self {
        Self {
            thread_pool: ThreadPoolSettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            semaphore: SemaphoreSettings::default(),
            execution_timeout_ms: 1_000,
            isolation_strategy: IsolationStrategy::Thread,
        }
    }
}

impl ResilienceConfiguration {
    pub fn new(
        thread_pool: ThreadPoolSettings,
        circuit_breaker: CircuitBreakerSettings,
        semaphore: SemaphoreSettings,
        execution_timeout_ms: u64,
        isolation_strategy: IsolationStrategy,
    ) -> Self {
        Self {
            thread_pool,
            circuit_breaker,
            semaphore,
            execution_timeout_ms,
            isolation_strategy,
        }
    }

    pub fn thread_pool(&self) -> &ThreadPoolSettings {
        &self.thread_pool
    }

    pub fn circuit_breaker(&self) -> &CircuitBreakerSettings {
        &self.circuit_breaker
    }

    pub fn semaphore(&self) -> &SemaphoreSettings {
        &self.semaphore
    }

    pub fn execution_timeout_ms(&self) -> u64 {
        self.execution_timeout_ms
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn isolation_strategy(&self) -> IsolationStrategy {
        self.isolation_strategy
    }

    pub fn with_thread_pool(mut self, thread_pool: ThreadPoolSettings) -> Self {
        self.thread_pool = thread_pool;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerSettings) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_semaphore(mut self, semaphore: SemaphoreSettings) -> Self {
        self.semaphore = semaphore;
        self
    }

    pub fn with_execution_timeout_ms(mut self, execution_timeout_ms: u64) -> Self {
        self.execution_timeout_ms = execution_timeout_ms;
        self
    }

    pub fn with_isolation_strategy(mut self, isolation_strategy: IsolationStrategy) -> Self {
        self.isolation_strategy = isolation_strategy;
        self
    }
}
