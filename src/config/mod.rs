//! Service configuration.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TenacityConfig (validated, immutable)
//!     → lifecycle::startup wires subsystems from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; dependency tuning changes go through
//!   the property source, not a reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, HttpConfig, ListenerConfig, LogFormat, ObservabilityConfig, PropertiesConfig,
    TenacityConfig,
};
pub use validation::{validate_config, ValidationError};
