//! Document validation subsystem.
//!
//! # Data Flow
//! ```text
//! document (serde_json::Value)
//!     → engine.rs (look up compiled schema, or compile an inline one)
//!     → report.rs (collect violations, cap at max_errors)
//!     → ValidationReport / BatchReport (serialized by the HTTP layer)
//! ```

pub mod engine;
pub mod report;

pub use engine::ValidationEngine;
pub use report::{BatchItem, BatchReport, ValidationReport, Violation};
