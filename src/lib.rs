//! JSON Validation Service Library
//!
//! A network service that validates JSON documents against JSON Schema
//! definitions held in an in-memory registry.
//!
//! # Architecture Overview
//!
//! ```text
//!     main ──▶ lifecycle::startup::run
//!                 ├─ JsonValidationService::new()   config → logging → registry
//!                 └─ service.start()                metrics → watcher → listener
//!                          │
//!                          ▼
//!     Client ──▶ http::server (request id, trace, limits, rate limit, auth)
//!                 ├─ /schemas ... ──▶ registry (arc-swap snapshot, $ref resolver)
//!                 └─ /validate ... ─▶ validation (jsonschema, reports)
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod security;
pub mod service;
pub mod validation;

pub use config::ServiceConfig;
pub use error::JvsError;
pub use http::HttpServer;
pub use lifecycle::{run, Shutdown};
pub use service::JsonValidationService;
