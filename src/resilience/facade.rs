use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use tokio::runtime::Handle;

use super::error::{FallbackRejected, ResilienceError};
use super::outcome::ExecutionResult;
use crate::dependency::{DependencyKey, IsolationStrategy, ResilienceConfiguration};
use crate::engine::{BoxError, ExecutionEngine, FailureCause, LocalEngine};
use crate::observability::metrics;
use crate::registry::ConfigurationRegistry;

/// Zero-argument fallback producing the same result type as the operation.
pub type Fallback<T> = Box<dyn FnOnce() -> Result<T, BoxError> + Send>;

/// Guards calls to named dependencies.
///
/// Every call resolves the dependency's current configuration, hands the
/// work to the engine and, when the engine reports a failure, runs the
/// fallback if one was given.
pub struct ResilienceFacade<E = LocalEngine> {
    registry: Arc<ConfigurationRegistry>,
    engine: Arc<E>,
    handle: Handle,
}

impl<E> Clone for ResilienceFacade<E> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            engine: self.engine.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<E: ExecutionEngine> ResilienceFacade<E> {
    /// `handle` drives blocking-mode calls; it should belong to a
    /// multi-threaded runtime.
    pub fn new(registry: Arc<ConfigurationRegistry>, engine: Arc<E>, handle: Handle) -> Self {
        Self {
            registry,
            engine,
            handle,
        }
    }

    pub fn registry(&self) -> &Arc<ConfigurationRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Blocking mode.
    ///
    /// Under THREAD isolation the operation runs on the runtime's blocking
    /// pool and is abandoned on timeout; under SEMAPHORE isolation it runs
    /// on the calling thread.
    ///
    /// # Panics
    ///
    /// Panics when called from a thread that is driving an async runtime.
    /// Use [`execute_async`](Self::execute_async) there.
    pub fn execute<T, F>(
        &self,
        key: &DependencyKey,
        operation: F,
        fallback: Option<Fallback<T>>,
    ) -> Result<ExecutionResult<T>, ResilienceError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, BoxError> + Send + 'static,
    {
        let config = self.registry.resolve(key);
        match config.isolation_strategy() {
            IsolationStrategy::Thread => {
                let work = async move {
                    match tokio::task::spawn_blocking(operation).await {
                        Ok(result) => result,
                        Err(join_err) => Err(Box::new(join_err) as BoxError),
                    }
                };
                self.handle.block_on(self.run_resolved(key, config, work, fallback))
            }
            IsolationStrategy::Semaphore => {
                let work = async move { operation() };
                self.handle.block_on(self.run_resolved(key, config, work, fallback))
            }
        }
    }

    /// Asynchronous mode. The operation's future is created right away but
    /// only polled once admitted.
    pub async fn execute_async<T, F, Fut>(
        &self,
        key: &DependencyKey,
        operation: F,
        fallback: Option<Fallback<T>>,
    ) -> Result<ExecutionResult<T>, ResilienceError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        let config = self.registry.resolve(key);
        self.run_resolved(key, config, operation(), fallback).await
    }

    /// Reactive mode: a cold stream yielding exactly one item. Nothing is
    /// resolved or run until the stream is first polled.
    pub fn observe<T, F, Fut>(
        &self,
        key: DependencyKey,
        operation: F,
        fallback: Option<Fallback<T>>,
    ) -> impl Stream<Item = Result<ExecutionResult<T>, ResilienceError>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        let facade = self.clone();
        stream::once(async move { facade.execute_async(&key, operation, fallback).await })
    }

    async fn run_resolved<T, Fut>(
        &self,
        key: &DependencyKey,
        config: ResilienceConfiguration,
        work: Fut,
        fallback: Option<Fallback<T>>,
    ) -> Result<ExecutionResult<T>, ResilienceError>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        match self.engine.run(key, &config, work).await {
            Ok(value) => {
                metrics::record_execution(key, "success");
                Ok(ExecutionResult::success(value))
            }
            Err(cause) => {
                metrics::record_execution(key, cause.label());
                self.recover(key, &config, cause, fallback)
            }
        }
    }

    fn recover<T>(
        &self,
        key: &DependencyKey,
        config: &ResilienceConfiguration,
        cause: FailureCause,
        fallback: Option<Fallback<T>>,
    ) -> Result<ExecutionResult<T>, ResilienceError> {
        let Some(fallback) = fallback else {
            return Err(ResilienceError::Failed {
                key: key.clone(),
                cause,
            });
        };

        let Some(_permit) = self.engine.acquire_fallback(key, config) else {
            let max_concurrent = config.semaphore().fallback_max_concurrent_requests();
            tracing::warn!(key = %key, cause = %cause, max_concurrent, "Fallback rejected");
            return Err(ResilienceError::FallbackFailure {
                key: key.clone(),
                cause,
                source: Box::new(FallbackRejected { max_concurrent }),
            });
        };

        metrics::record_fallback(key, &cause);
        tracing::debug!(key = %key, cause = %cause, "Running fallback");
        match fallback() {
            Ok(value) => Ok(ExecutionResult::from_fallback(value, cause)),
            Err(source) => {
                tracing::warn!(key = %key, cause = %cause, error = %source, "Fallback failed");
                Err(ResilienceError::FallbackFailure {
                    key: key.clone(),
                    cause,
                    source,
                })
            }
        }
    }
}
