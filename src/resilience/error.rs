//! Errors surfaced by the facade.

use thiserror::Error;

use crate::dependency::DependencyKey;
use crate::engine::{BoxError, FailureCause};

#[derive(Debug, Error)]
pub enum ResilienceError {
    /// The operation failed and no fallback was supplied.
    #[error("{key}: {cause}")]
    Failed { key: DependencyKey, cause: FailureCause },

    /// The fallback itself failed or could not run.
    #[error("{key}: fallback failed after {cause}: {source}")]
    FallbackFailure {
        key: DependencyKey,
        cause: FailureCause,
        #[source]
        source: BoxError,
    },
}

impl ResilienceError {
    pub fn key(&self) -> &DependencyKey {
        match self {
            Self::Failed { key, .. } | Self::FallbackFailure { key, .. } => key,
        }
    }

    /// The failure that sent the call down the error path.
    pub fn cause(&self) -> &FailureCause {
        match self {
            Self::Failed { cause, .. } | Self::FallbackFailure { cause, .. } => cause,
        }
    }

    /// Throttling failures are reported as such at the HTTP boundary.
    /// A failed fallback never is.
    pub fn is_throttling(&self) -> bool {
        match self {
            Self::Failed { cause, .. } => cause.is_throttling(),
            Self::FallbackFailure { .. } => false,
        }
    }

    pub fn is_fallback_failure(&self) -> bool {
        matches!(self, Self::FallbackFailure { .. })
    }
}

/// The fallback bulkhead had no free slot.
#[derive(Debug, Error)]
#[error("fallback rejected: {max_concurrent} concurrent fallbacks already running")]
pub struct FallbackRejected {
    pub max_concurrent: u32,
}
