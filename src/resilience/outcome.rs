//! Successful results and how they were produced.

use crate::engine::FailureCause;

/// Whether the value came from the operation or from its fallback.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success,
    Fallback(FailureCause),
}

/// A value plus its provenance, so callers can ask after the fact why a
/// fallback was used.
#[derive(Debug, Clone)]
pub struct ExecutionResult<T> {
    value: T,
    outcome: Outcome,
}

impl<T> ExecutionResult<T> {
    pub fn success(value: T) -> Self {
        Self {
            value,
            outcome: Outcome::Success,
        }
    }

    pub fn from_fallback(value: T, cause: FailureCause) -> Self {
        Self {
            value,
            outcome: Outcome::Fallback(cause),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.outcome, Outcome::Success)
    }

    pub fn is_response_from_fallback(&self) -> bool {
        matches!(self.outcome, Outcome::Fallback(_))
    }

    /// Why the operation's own result was not used.
    pub fn failure_cause(&self) -> Option<&FailureCause> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Fallback(cause) => Some(cause),
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self.failure_cause(), Some(FailureCause::Timeout { .. }))
    }

    pub fn is_short_circuited(&self) -> bool {
        matches!(self.failure_cause(), Some(FailureCause::ShortCircuited))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.failure_cause(), Some(FailureCause::BulkheadRejected { .. }))
    }

    pub fn is_failed_execution(&self) -> bool {
        matches!(self.failure_cause(), Some(FailureCause::ExecutionFailure(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::IsolationStrategy;

    #[test]
    fn test_queries_follow_outcome() {
        let ok = ExecutionResult::success(1);
        assert!(ok.is_successful());
        assert!(!ok.is_response_from_fallback());
        assert!(ok.failure_cause().is_none());

        let timed_out = ExecutionResult::from_fallback(2, FailureCause::Timeout { timeout_ms: 5 });
        assert!(timed_out.is_response_from_fallback());
        assert!(timed_out.is_timed_out());
        assert!(!timed_out.is_short_circuited());
        assert_eq!(timed_out.into_value(), 2);

        let rejected = ExecutionResult::from_fallback(
            3,
            FailureCause::BulkheadRejected {
                isolation: IsolationStrategy::Semaphore,
            },
        );
        assert!(rejected.is_rejected());
        assert!(!rejected.is_failed_execution());
    }
}
