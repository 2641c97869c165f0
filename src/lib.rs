//! Tenacity: per-dependency resilience configuration with dynamic
//! overrides and administrative circuit control.
//!
//! ```text
//! dependency  → keys and the ResilienceConfiguration data model
//! properties  → dynamic property source (in-memory, polling, file watch)
//! registry    → defaults < registered < remote merge, resolve per call
//! engine      → breaker, bulkheads and timeouts (LocalEngine)
//! resilience  → ResilienceFacade: execute with fallback, three modes
//! circuit     → CircuitBreakerAdmin: query and force breaker state
//! admin/http  → JSON admin API
//! config, observability, lifecycle → service plumbing
//! ```

// Core
pub mod circuit;
pub mod dependency;
pub mod engine;
pub mod properties;
pub mod registry;
pub mod resilience;

// Boundary
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use circuit::{CircuitBreakerAdmin, CircuitBreakerView, ForceCommand};
pub use config::TenacityConfig;
pub use dependency::{DependencyKey, IsolationStrategy, KeyFactory, ResilienceConfiguration};
pub use engine::{BoxError, CircuitBreakerState, FailureCause, LocalEngine};
pub use http::HttpServer;
pub use lifecycle::{Shutdown, Tenacity};
pub use properties::{InMemoryPropertySource, PropertySource};
pub use registry::ConfigurationRegistry;
pub use resilience::{ExecutionResult, Fallback, ResilienceError, ResilienceFacade};
