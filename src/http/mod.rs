//! HTTP boundary.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → admin (handlers) or application routes (facade)
//!     → response.rs (JSON bodies, error → status mapping)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use response::{AdminError, DependencyFailure, ErrorBody, ThrottlingMapper, CACHE_CONTROL_VALUE};
pub use server::{AppState, HttpServer};
