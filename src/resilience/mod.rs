//! Resilience facade: the per-call contract.
//!
//! # Data Flow
//! ```text
//! Caller (blocking / async / stream)
//!     → facade.rs: registry.resolve(key)
//!     → ExecutionEngine::run (breaker, bulkhead, timeout)
//!     → On failure: fallback under the fallback bulkhead
//!     → outcome.rs: ExecutionResult (value + how it was produced)
//!     → error.rs: ResilienceError when nothing could produce a value
//! ```
//!
//! # Design Decisions
//! - One generic `execute` taking closures plus a tagged failure cause
//! - All three invocation modes share resolution and classification
//! - A failing fallback is always surfaced, never swallowed

pub mod error;
pub mod facade;
pub mod outcome;

pub use error::{FallbackRejected, ResilienceError};
pub use facade::{Fallback, ResilienceFacade};
pub use outcome::{ExecutionResult, Outcome};
