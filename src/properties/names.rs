//! Property naming convention.
//!
//! Names are shared with external dashboards and config UIs, so they must
//! stay byte-for-byte stable:
//!
//! ```text
//! resilience.command.<KEY>.execution.isolation.thread.timeoutInMilliseconds
//! resilience.command.<KEY>.circuitBreaker.forceOpen
//! resilience.threadpool.<KEY>.coreSize
//! ...
//! ```

use crate::dependency::DependencyKey;

pub const PREFIX: &str = "resilience";

/// Property names for one dependency key.
#[derive(Debug, Clone)]
pub struct PropertyNames {
    command: String,
    threadpool: String,
}

impl PropertyNames {
    pub fn for_key(key: &DependencyKey) -> Self {
        Self {
            command: format!("{PREFIX}.command.{}.", key.name()),
            threadpool: format!("{PREFIX}.threadpool.{}.", key.name()),
        }
    }

    fn command(&self, suffix: &str) -> String {
        format!("{}{}", self.command, suffix)
    }

    fn threadpool(&self, suffix: &str) -> String {
        format!("{}{}", self.threadpool, suffix)
    }

    /// Prefix shared by every command-scoped property of this key.
    pub fn command_prefix(&self) -> &str {
        &self.command
    }

    pub fn isolation_strategy(&self) -> String {
        self.command("execution.isolation.strategy")
    }

    pub fn execution_timeout(&self) -> String {
        self.command("execution.isolation.thread.timeoutInMilliseconds")
    }

    pub fn semaphore_max_concurrent(&self) -> String {
        self.command("execution.isolation.semaphore.maxConcurrentRequests")
    }

    pub fn fallback_max_concurrent(&self) -> String {
        self.command("fallback.isolation.semaphore.maxConcurrentRequests")
    }

    pub fn request_volume_threshold(&self) -> String {
        self.command("circuitBreaker.requestVolumeThreshold")
    }

    pub fn sleep_window(&self) -> String {
        self.command("circuitBreaker.sleepWindowInMilliseconds")
    }

    pub fn error_threshold_percentage(&self) -> String {
        self.command("circuitBreaker.errorThresholdPercentage")
    }

    pub fn force_open(&self) -> String {
        self.command("circuitBreaker.forceOpen")
    }

    pub fn force_closed(&self) -> String {
        self.command("circuitBreaker.forceClosed")
    }

    pub fn command_metrics_window(&self) -> String {
        self.command("metrics.rollingStats.timeInMilliseconds")
    }

    pub fn command_metrics_buckets(&self) -> String {
        self.command("metrics.rollingStats.numBuckets")
    }

    pub fn core_size(&self) -> String {
        self.threadpool("coreSize")
    }

    pub fn keep_alive_minutes(&self) -> String {
        self.threadpool("keepAliveTimeMinutes")
    }

    pub fn max_queue_size(&self) -> String {
        self.threadpool("maxQueueSize")
    }

    pub fn queue_rejection_threshold(&self) -> String {
        self.threadpool("queueSizeRejectionThreshold")
    }

    pub fn threadpool_metrics_window(&self) -> String {
        self.threadpool("metrics.rollingStats.timeInMilliseconds")
    }

    pub fn threadpool_metrics_buckets(&self) -> String {
        self.threadpool("metrics.rollingStats.numBuckets")
    }
}
