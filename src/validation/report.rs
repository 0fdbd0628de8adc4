//! Validation result types returned to clients.

use std::fmt;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON Pointer to the violating value in the document. Empty for the root.
    pub instance_path: String,
    /// JSON Pointer to the schema keyword that rejected it.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Registered schema name; absent for inline schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub valid: bool,
    pub errors: Vec<Violation>,
    /// More violations existed than were reported.
    pub truncated: bool,
}

impl ValidationReport {
    /// Run `validator` over `instance`, keeping at most `max_errors` violations.
    pub fn evaluate(
        schema: Option<&str>,
        validator: &Validator,
        instance: &Value,
        max_errors: usize,
    ) -> Self {
        let mut violations = validator.iter_errors(instance).map(|e| Violation {
            instance_path: e.instance_path.to_string(),
            schema_path: e.schema_path.to_string(),
            message: e.to_string(),
        });

        let errors: Vec<Violation> = violations.by_ref().take(max_errors).collect();
        let truncated = violations.next().is_some();

        Self {
            schema: schema.map(str::to_string),
            valid: errors.is_empty(),
            errors,
            truncated,
        }
    }
}

/// Per-document entry in a batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub valid: bool,
    pub errors: Vec<Violation>,
    pub truncated: bool,
}

/// Outcome of validating many documents against one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub schema: String,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub results: Vec<BatchItem>,
}

impl BatchReport {
    pub fn from_reports(schema: &str, reports: impl IntoIterator<Item = ValidationReport>) -> Self {
        let results: Vec<BatchItem> = reports
            .into_iter()
            .enumerate()
            .map(|(index, r)| BatchItem {
                index,
                valid: r.valid,
                errors: r.errors,
                truncated: r.truncated,
            })
            .collect();
        let valid_count = results.iter().filter(|r| r.valid).count();

        Self {
            schema: schema.to_string(),
            valid_count,
            invalid_count: results.len() - valid_count,
            results,
        }
    }
}
