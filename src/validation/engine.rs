//! Validation engine: looks schemas up and produces reports.

use std::sync::Arc;

use serde_json::Value;

use crate::observability::metrics;
use crate::registry::{RegistryError, SchemaRegistry};
use crate::validation::report::{BatchReport, ValidationReport};

/// Label used in metrics for schemas supplied inline with the document.
const INLINE_SCHEMA: &str = "(inline)";

/// Validates documents against registered or inline schemas.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    registry: Arc<SchemaRegistry>,
    max_errors: usize,
}

impl ValidationEngine {
    pub fn new(registry: Arc<SchemaRegistry>, max_errors: usize) -> Self {
        Self {
            registry,
            max_errors,
        }
    }

    /// Validate `document` against the registered schema `name`.
    pub fn validate_named(
        &self,
        name: &str,
        document: &Value,
    ) -> Result<ValidationReport, RegistryError> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let report =
            ValidationReport::evaluate(Some(name), entry.validator(), document, self.max_errors);
        metrics::record_validation(name, report.valid);
        tracing::debug!(
            schema = %name,
            valid = report.valid,
            errors = report.errors.len(),
            "Document validated"
        );
        Ok(report)
    }

    /// Validate every document in `documents` against `name`.
    ///
    /// The schema is looked up once, so a concurrent replacement does not
    /// split the batch across two versions.
    pub fn validate_batch(
        &self,
        name: &str,
        documents: &[Value],
    ) -> Result<BatchReport, RegistryError> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let reports = documents.iter().map(|doc| {
            let report =
                ValidationReport::evaluate(Some(name), entry.validator(), doc, self.max_errors);
            metrics::record_validation(name, report.valid);
            report
        });
        let batch = BatchReport::from_reports(name, reports);

        tracing::debug!(
            schema = %name,
            documents = documents.len(),
            invalid = batch.invalid_count,
            "Batch validated"
        );
        Ok(batch)
    }

    /// Validate against a schema supplied with the request.
    ///
    /// The schema may `$ref` registered schemas but is not stored.
    pub fn validate_adhoc(
        &self,
        schema: &Value,
        document: &Value,
    ) -> Result<ValidationReport, RegistryError> {
        let validator = self.registry.compile_detached(schema)?;
        let report = ValidationReport::evaluate(None, &validator, document, self.max_errors);
        metrics::record_validation(INLINE_SCHEMA, report.valid);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaOrigin;
    use serde_json::json;

    fn engine(max_errors: usize) -> ValidationEngine {
        let registry = Arc::new(SchemaRegistry::default());
        registry
            .register(
                "point",
                json!({
                    "type": "object",
                    "required": ["x", "y"],
                    "properties": {"x": {"type": "number"}, "y": {"type": "number"}}
                }),
                SchemaOrigin::Api,
            )
            .unwrap();
        ValidationEngine::new(registry, max_errors)
    }

    #[test]
    fn named_validation() {
        let engine = engine(10);
        assert!(engine.validate_named("point", &json!({"x": 1, "y": 2})).unwrap().valid);

        let report = engine.validate_named("point", &json!({"x": "1"})).unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn unknown_schema() {
        let err = engine(10).validate_named("nope", &json!({})).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(name) if name == "nope"));
    }

    #[test]
    fn batch_validation() {
        let docs = vec![json!({"x": 0, "y": 0}), json!({}), json!({"x": 1, "y": 1})];
        let batch = engine(1).validate_batch("point", &docs).unwrap();
        assert_eq!(batch.valid_count, 2);
        assert_eq!(batch.invalid_count, 1);
        assert!(batch.results[1].truncated);
    }

    #[test]
    fn adhoc_can_reference_registry() {
        let engine = engine(10);
        let schema = json!({"type": "array", "items": {"$ref": "point.json"}});

        let report = engine.validate_adhoc(&schema, &json!([{"x": 1, "y": 2}])).unwrap();
        assert!(report.valid);
        assert!(report.schema.is_none());

        let report = engine.validate_adhoc(&schema, &json!([{"x": 1}])).unwrap();
        assert_eq!(report.errors[0].instance_path, "/0");
    }

    #[test]
    fn adhoc_invalid_schema() {
        let err = engine(10).validate_adhoc(&json!({"type": 42}), &json!(1)).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }
}
