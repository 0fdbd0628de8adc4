//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! $JVS_CONFIG or ./jvs.toml (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc with the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; schemas are the only hot-reloaded state
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::{
    AdminConfig, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    SchemaSourceConfig, ServiceConfig, TimeoutConfig, TlsConfig, ValidationConfig,
};
pub use validation::{validate_config, ConfigIssue};
