//! In-process execution engine on the tokio runtime.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use super::breaker::{CircuitBreaker, Forced, HealthCounts};
use super::bulkhead::{Admission, SemaphoreBulkhead, ThreadPoolBulkhead};
use super::{BoxError, CircuitBreakerState, CircuitControl, ExecutionEngine, FailureCause, FallbackPermit};
use crate::dependency::{DependencyKey, IsolationStrategy, ResilienceConfiguration};
use crate::properties::{PropertyNames, PropertySource};

struct DependencyState {
    breaker: CircuitBreaker,
    pool: ArcSwap<ThreadPoolBulkhead>,
    semaphore: ArcSwap<SemaphoreBulkhead>,
    fallback: ArcSwap<SemaphoreBulkhead>,
}

impl DependencyState {
    fn new(config: &ResilienceConfiguration) -> Self {
        Self {
            breaker: CircuitBreaker::new(*config.circuit_breaker()),
            pool: ArcSwap::from_pointee(ThreadPoolBulkhead::new(config.thread_pool())),
            semaphore: ArcSwap::from_pointee(SemaphoreBulkhead::new(
                config.semaphore().max_concurrent_requests(),
            )),
            fallback: ArcSwap::from_pointee(SemaphoreBulkhead::new(
                config.semaphore().fallback_max_concurrent_requests(),
            )),
        }
    }

    /// Bring limits in line with the configuration resolved for this call.
    /// Resized bulkheads are replaced; callers already inside keep their
    /// permits on the old one.
    fn refresh(&self, key: &DependencyKey, config: &ResilienceConfiguration) {
        self.breaker.update(*config.circuit_breaker());

        let tp = config.thread_pool();
        if self.pool.load().differs_from(tp) {
            tracing::info!(
                key = %key,
                core_size = tp.core_size(),
                queue_limit = ?tp.effective_queue_limit(),
                "Resizing worker pool"
            );
            self.pool.store(Arc::new(ThreadPoolBulkhead::new(tp)));
        }

        let sem = config.semaphore();
        if self.semaphore.load().size() != sem.max_concurrent_requests() {
            self.semaphore
                .store(Arc::new(SemaphoreBulkhead::new(sem.max_concurrent_requests())));
        }
        if self.fallback.load().size() != sem.fallback_max_concurrent_requests() {
            self.fallback
                .store(Arc::new(SemaphoreBulkhead::new(sem.fallback_max_concurrent_requests())));
        }
    }
}

/// Runs work on the current tokio runtime with per-dependency breakers and
/// bulkheads.
///
/// Breakers are created lazily on the first call for a key. Force flags are
/// read from the property source on every admission.
pub struct LocalEngine {
    properties: Arc<dyn PropertySource>,
    dependencies: DashMap<DependencyKey, Arc<DependencyState>>,
}

impl LocalEngine {
    pub fn new(properties: Arc<dyn PropertySource>) -> Self {
        properties.subscribe(Arc::new(|change| {
            if change.name.ends_with(".circuitBreaker.forceOpen")
                || change.name.ends_with(".circuitBreaker.forceClosed")
            {
                tracing::info!(
                    property = %change.name,
                    value = ?change.value,
                    "Circuit breaker override changed"
                );
            }
        }));

        Self {
            properties,
            dependencies: DashMap::new(),
        }
    }

    /// Rolling-window counts for `key`, `None` before its first call.
    pub fn health(&self, key: &DependencyKey) -> Option<HealthCounts> {
        self.dependencies.get(key).map(|s| s.breaker.health())
    }

    fn forced(&self, key: &DependencyKey) -> Forced {
        let names = PropertyNames::for_key(key);
        if self.properties.flag(&names.force_open()) {
            Forced::Open
        } else if self.properties.flag(&names.force_closed()) {
            Forced::Closed
        } else {
            Forced::None
        }
    }

    fn dependency(&self, key: &DependencyKey, config: &ResilienceConfiguration) -> Arc<DependencyState> {
        let state = match self.dependencies.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                tracing::info!(key = %key, "Circuit breaker instantiated");
                entry.insert(Arc::new(DependencyState::new(config))).clone()
            }
        };
        state.refresh(key, config);
        state
    }
}

impl CircuitControl for LocalEngine {
    fn instantiated(&self, key: &DependencyKey) -> bool {
        self.dependencies.contains_key(key)
    }

    fn state(&self, key: &DependencyKey) -> Option<CircuitBreakerState> {
        let state = self.dependencies.get(key).map(|s| s.value().clone())?;
        Some(state.breaker.state(self.forced(key)))
    }
}

impl ExecutionEngine for LocalEngine {
    async fn run<T, Fut>(
        &self,
        key: &DependencyKey,
        config: &ResilienceConfiguration,
        work: Fut,
    ) -> Result<T, FailureCause>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        let state = self.dependency(key, config);
        if !state.breaker.allow_request(self.forced(key)) {
            tracing::debug!(key = %key, "Short-circuited");
            return Err(FailureCause::ShortCircuited);
        }

        let timeout = config.execution_timeout();
        let outcome = match config.isolation_strategy() {
            IsolationStrategy::Thread => run_on_pool(state.pool.load_full(), timeout, work).await,
            IsolationStrategy::Semaphore => {
                run_with_permit(&state.semaphore.load_full(), timeout, work).await
            }
        };

        match &outcome {
            Ok(_) => state.breaker.mark_success(),
            Err(FailureCause::ShortCircuited) => {}
            Err(cause) => {
                tracing::debug!(key = %key, cause = %cause, "Execution failed");
                state.breaker.mark_failure();
            }
        }
        outcome
    }

    fn acquire_fallback(
        &self,
        key: &DependencyKey,
        config: &ResilienceConfiguration,
    ) -> Option<FallbackPermit> {
        let state = self.dependency(key, config);
        let permit = state.fallback.load().try_acquire()?;
        Some(FallbackPermit::bounded(permit))
    }
}

/// Caps deadlines so absurd timeouts cannot overflow `Instant`.
const MAX_DEADLINE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

fn timeout_cause(timeout: Duration) -> FailureCause {
    FailureCause::Timeout {
        timeout_ms: timeout.as_millis() as u64,
    }
}

fn into_cause(err: BoxError) -> FailureCause {
    FailureCause::ExecutionFailure(Arc::from(err))
}

/// THREAD isolation: the work runs as its own task while holding a worker.
/// Time spent queued counts against the timeout.
async fn run_on_pool<T, Fut>(pool: Arc<ThreadPoolBulkhead>, timeout: Duration, work: Fut) -> Result<T, FailureCause>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    let rejected = FailureCause::BulkheadRejected {
        isolation: IsolationStrategy::Thread,
    };
    let deadline = Instant::now() + timeout.min(MAX_DEADLINE);

    let worker = match pool.admit() {
        None => return Err(rejected),
        Some(Admission::Ready(permit)) => permit,
        Some(Admission::Queued(_slot)) => {
            match tokio::time::timeout_at(deadline, pool.wait_for_worker()).await {
                Ok(Some(permit)) => permit,
                Ok(None) => return Err(rejected),
                Err(_) => return Err(timeout_cause(timeout)),
            }
        }
    };

    let mut handle = tokio::spawn(async move {
        let _worker = worker;
        work.await
    });

    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(into_cause(err)),
        Ok(Err(join_err)) => Err(FailureCause::ExecutionFailure(Arc::new(join_err))),
        Err(_) => {
            handle.abort();
            Err(timeout_cause(timeout))
        }
    }
}

/// SEMAPHORE isolation: the work runs on the caller's task. Work that cannot
/// be interrupted and finishes late is still reported as a timeout.
async fn run_with_permit<T, Fut>(bulkhead: &SemaphoreBulkhead, timeout: Duration, work: Fut) -> Result<T, FailureCause>
where
    Fut: Future<Output = Result<T, BoxError>>,
{
    let Some(_permit) = bulkhead.try_acquire() else {
        return Err(FailureCause::BulkheadRejected {
            isolation: IsolationStrategy::Semaphore,
        });
    };

    let started = Instant::now();
    match tokio::time::timeout(timeout, work).await {
        Err(_) => Err(timeout_cause(timeout)),
        Ok(_) if started.elapsed() > timeout => Err(timeout_cause(timeout)),
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(into_cause(err)),
    }
}
