//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tenacity_executions_total` (counter): calls by key and outcome
//! - `tenacity_fallbacks_total` (counter): fallbacks by key and cause
//! - `tenacity_forced_state_total` (counter): admin overrides by key and state
//! - `tenacity_property_refreshes_total` (counter): applied snapshots by source
//!
//! Recording is a no-op until a recorder is installed, so library users that
//! never call `init_metrics` pay nothing.

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::circuit::ForceCommand;
use crate::dependency::DependencyKey;
use crate::engine::FailureCause;

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from inside a tokio runtime. Calling it again is a no-op.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    if let Some(existing) = INSTALLED.get() {
        tracing::debug!(address = %existing, "Metrics exporter already installed");
        return Ok(());
    }

    PrometheusBuilder::new().with_http_listener(addr).install()?;
    let _ = INSTALLED.set(addr);
    register_metrics();

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "tenacity_executions_total",
        "Guarded executions by dependency and outcome"
    );
    describe_counter!(
        "tenacity_fallbacks_total",
        "Fallback invocations by dependency and failure cause"
    );
    describe_counter!(
        "tenacity_forced_state_total",
        "Administrative circuit breaker overrides"
    );
    describe_counter!(
        "tenacity_property_refreshes_total",
        "Remote property snapshots applied"
    );
}

/// `outcome` is `success` or a failure cause label.
pub fn record_execution(key: &DependencyKey, outcome: &'static str) {
    counter!(
        "tenacity_executions_total",
        "key" => key.name().to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_fallback(key: &DependencyKey, cause: &FailureCause) {
    counter!(
        "tenacity_fallbacks_total",
        "key" => key.name().to_string(),
        "cause" => cause.label()
    )
    .increment(1);
}

pub fn record_forced_state(key: &DependencyKey, command: ForceCommand) {
    counter!(
        "tenacity_forced_state_total",
        "key" => key.name().to_string(),
        "state" => command.as_str()
    )
    .increment(1);
}

pub fn record_property_refresh(source: &str) {
    counter!("tenacity_property_refreshes_total", "source" => source.to_string()).increment(1);
}
