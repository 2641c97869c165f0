//! Administrative control of circuit breakers.
//!
//! # Data Flow
//! ```text
//! AdminAPI / CLI
//!     → CircuitBreakerAdmin::force_state()
//!         → PropertySource::set()/clear() on circuitBreaker.force*
//!         → CircuitControl::state() (engine view, if instantiated)
//! ```
//!
//! Force overrides are plain properties, so a write for a key with no
//! breaker yet takes effect once the first call instantiates one.

pub mod admin;

pub use admin::{CircuitBreakerAdmin, CircuitBreakerView, ForceCommand};
