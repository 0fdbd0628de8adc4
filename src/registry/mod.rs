//! Schema registry subsystem.
//!
//! # Data Flow
//! ```text
//! schema directory (*.json)          PUT /schemas/{name}
//!     → directory.rs (read & name)       │
//!     → resolver.rs (compile, $ref)  ◀───┘
//!     → store.rs (publish new snapshot)
//!     → readers load the snapshot lock-free
//!
//! On directory change:
//!     watcher.rs detects change
//!     → store.rs reloads every directory-origin entry at once
//!     → a failed reload keeps the previous snapshot
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; writers use read-copy-update via arc-swap
//! - `$ref` only resolves against registered schemas, never the network
//! - Schemas are compiled once on insert, validated many times

pub mod directory;
pub mod resolver;
pub mod store;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

pub use resolver::CompileSettings;
pub use store::{SchemaEntry, SchemaOrigin, SchemaRegistry, SchemaSummary};
pub use watcher::SchemaWatcher;

/// Errors raised while registering, loading or looking up schemas.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid schema name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("schema '{0}' not found")]
    NotFound(String),

    #[error("schema '{name}' does not compile: {reason}")]
    InvalidSchema { name: String, reason: String },

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
