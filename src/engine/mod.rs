//! Execution engine subsystem.
//!
//! # Data Flow
//! ```text
//! Facade (resolved ResilienceConfiguration + work future)
//!     → ExecutionEngine::run
//!         → breaker.rs  (admission: forced flags, then rolling-window health)
//!         → bulkhead.rs (worker pool + queue, or counting permit)
//!         → timeout     (abandon work past executionTimeoutMs)
//!         → breaker.rs  (record success / failure)
//!
//! Admin (circuit)
//!     → CircuitControl::instantiated / state
//! ```
//!
//! # Design Decisions
//! - The core only sees the two traits; `LocalEngine` is the in-process
//!   implementation
//! - Forced flags live in the property source and are read on every
//!   admission, so admin writes apply to the next call
//! - Short-circuits are not counted as failures; timeouts and rejections are

pub mod breaker;
pub mod bulkhead;
pub mod local;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;

use crate::dependency::{DependencyKey, IsolationStrategy, ResilienceConfiguration};

pub use local::LocalEngine;

/// Error type produced by user operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why an operation did not produce its own result.
#[derive(Debug, Clone, Error)]
pub enum FailureCause {
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("short-circuited: circuit is open")]
    ShortCircuited,
    #[error("rejected by {isolation} bulkhead")]
    BulkheadRejected { isolation: IsolationStrategy },
    #[error("execution failed: {0}")]
    ExecutionFailure(Arc<dyn std::error::Error + Send + Sync>),
}

impl FailureCause {
    /// Causes the boundary reports as throttling rather than a fault.
    pub fn is_throttling(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ShortCircuited | Self::BulkheadRejected { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::ShortCircuited => "short_circuited",
            Self::BulkheadRejected { .. } => "bulkhead_rejected",
            Self::ExecutionFailure(_) => "execution_failure",
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    Closed,
    Open,
    ForcedOpen,
    ForcedClosed,
}

impl CircuitBreakerState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::ForcedOpen)
    }
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::ForcedOpen => "FORCED_OPEN",
            Self::ForcedClosed => "FORCED_CLOSED",
        };
        f.write_str(s)
    }
}

/// Read side of the engine used by circuit administration.
pub trait CircuitControl: Send + Sync {
    /// True once at least one call has gone through `key`.
    fn instantiated(&self, key: &DependencyKey) -> bool;

    /// Current state, `None` when no breaker exists for `key`.
    fn state(&self, key: &DependencyKey) -> Option<CircuitBreakerState>;

    fn is_open(&self, key: &DependencyKey) -> bool {
        self.state(key).is_some_and(|s| s.is_open())
    }
}

/// Held while a fallback runs; releases its slot on drop.
#[derive(Debug)]
pub struct FallbackPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl FallbackPermit {
    pub fn bounded(permit: OwnedSemaphorePermit) -> Self {
        Self { _permit: Some(permit) }
    }

    pub fn unbounded() -> Self {
        Self { _permit: None }
    }
}

/// Runs work under isolation, timeout and circuit breaking.
pub trait ExecutionEngine: CircuitControl + 'static {
    /// Run `work` for `key` with the given configuration.
    fn run<T, Fut>(
        &self,
        key: &DependencyKey,
        config: &ResilienceConfiguration,
        work: Fut,
    ) -> impl Future<Output = Result<T, FailureCause>> + Send
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static;

    /// Claim a fallback slot, `None` when the fallback bulkhead is full.
    fn acquire_fallback(
        &self,
        key: &DependencyKey,
        config: &ResilienceConfiguration,
    ) -> Option<FallbackPermit>;
}
