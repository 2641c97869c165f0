//! Dependency data model.
//!
//! # Data Flow
//! ```text
//! Application / config file
//!     → key.rs (DependencyKey via KeyFactory)
//!     → configuration.rs (validated ResilienceConfiguration)
//!     → registry (flattened into properties)
//! ```

pub mod configuration;
pub mod key;

pub use configuration::{
    CircuitBreakerSettings, ConfigurationError, IsolationStrategy, ResilienceConfiguration,
    SemaphoreSettings, ThreadPoolSettings,
};
pub use key::{DependencyKey, KeyError, KeyFactory, OpenKeyFactory, StaticKeyFactory};
