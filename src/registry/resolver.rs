//! Schema compilation and `$ref` resolution.
//!
//! Cross-schema references are resolved from the registry contents only:
//! first by exact `$id`, then by the last path segment of the URI with any
//! `.schema.json` / `.json` suffix removed. Unknown references fail
//! compilation instead of reaching out to the network.

use std::collections::HashMap;

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::Value;

/// Options applied to every schema the registry compiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileSettings {
    /// Treat `format` as an assertion.
    pub validate_formats: bool,
}

/// Resolves `$ref` URIs to schemas held in memory.
#[derive(Debug, Default)]
pub struct RegistryRetriever {
    by_id: HashMap<String, Value>,
    by_name: HashMap<String, Value>,
}

impl RegistryRetriever {
    /// Index the given `(name, source)` pairs.
    pub fn new<'a>(sources: impl IntoIterator<Item = (&'a str, &'a Value)>) -> Self {
        let mut retriever = Self::default();
        for (name, source) in sources {
            if let Some(id) = source.get("$id").and_then(Value::as_str) {
                retriever
                    .by_id
                    .insert(id.trim_end_matches('#').to_string(), source.clone());
            }
            retriever.by_name.insert(name.to_string(), source.clone());
        }
        retriever
    }

    fn lookup(&self, uri: &str) -> Option<&Value> {
        let uri = uri.split('#').next().unwrap_or(uri);
        self.by_id
            .get(uri)
            .or_else(|| schema_name_from_uri(uri).and_then(|name| self.by_name.get(name)))
    }
}

impl Retrieve for RegistryRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri = uri.as_str();
        match self.lookup(uri) {
            Some(value) => Ok(value.clone()),
            None => {
                tracing::debug!(%uri, "Unresolvable schema reference");
                Err(format!("no registered schema matches '{uri}'").into())
            }
        }
    }
}

/// Extract the registry name a reference URI points at.
///
/// `https://example.com/schemas/address.schema.json` → `address`.
pub fn schema_name_from_uri(uri: &str) -> Option<&str> {
    let segment = uri.rsplit(|c| c == '/' || c == ':').next()?;
    let name = segment
        .strip_suffix(".schema.json")
        .or_else(|| segment.strip_suffix(".json"))
        .unwrap_or(segment);
    (!name.is_empty()).then_some(name)
}

/// Compile `schema`, resolving references through `retriever`.
pub fn compile(
    schema: &Value,
    retriever: RegistryRetriever,
    settings: CompileSettings,
) -> Result<Validator, String> {
    let mut opts = jsonschema::options();
    opts.with_retriever(retriever);
    opts.should_validate_formats(settings.validate_formats);
    opts.build(schema).map_err(|e| e.to_string())
}
