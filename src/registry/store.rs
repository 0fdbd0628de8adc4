//! In-memory schema store.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use jsonschema::Validator;
use serde::Serialize;
use serde_json::Value;

use crate::observability::metrics;
use crate::registry::directory::read_schema_dir;
use crate::registry::resolver::{compile, CompileSettings, RegistryRetriever};
use crate::registry::RegistryError;

const MAX_NAME_LEN: usize = 128;

/// Where a registered schema came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaOrigin {
    /// Loaded from the schema directory; replaced on every reload.
    Directory,
    /// Registered over HTTP; survives directory reloads.
    Api,
}

/// A compiled schema ready for validation.
pub struct SchemaEntry {
    pub name: String,
    pub source: Value,
    pub id: Option<String>,
    pub title: Option<String>,
    pub origin: SchemaOrigin,
    validator: Validator,
}

impl SchemaEntry {
    fn new(name: &str, source: Value, origin: SchemaOrigin, validator: Validator) -> Self {
        let text = |key: &str| source.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            name: name.to_string(),
            id: text("$id"),
            title: text("title"),
            source,
            origin,
            validator,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn summary(&self) -> SchemaSummary {
        SchemaSummary {
            name: self.name.clone(),
            id: self.id.clone(),
            title: self.title.clone(),
            origin: self.origin,
        }
    }
}

impl fmt::Debug for SchemaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaEntry")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Listing view of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSummary {
    pub name: String,
    pub id: Option<String>,
    pub title: Option<String>,
    pub origin: SchemaOrigin,
}

type Snapshot = HashMap<String, Arc<SchemaEntry>>;

/// Thread-safe registry of compiled schemas.
///
/// Readers load an immutable snapshot; every mutation publishes a new one.
pub struct SchemaRegistry {
    snapshot: ArcSwap<Snapshot>,
    settings: CompileSettings,
}

impl SchemaRegistry {
    pub fn new(settings: CompileSettings) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            settings,
        }
    }

    /// Compile and insert a schema, replacing any entry of the same name.
    pub fn register(
        &self,
        name: &str,
        source: Value,
        origin: SchemaOrigin,
    ) -> Result<Arc<SchemaEntry>, RegistryError> {
        validate_name(name)?;

        let current = self.snapshot.load();
        let retriever = RegistryRetriever::new(
            current
                .values()
                .filter(|e| e.name != name)
                .map(|e| (e.name.as_str(), &e.source))
                .chain(std::iter::once((name, &source))),
        );
        let validator = compile(&source, retriever, self.settings).map_err(|reason| {
            RegistryError::InvalidSchema {
                name: name.to_string(),
                reason,
            }
        })?;
        drop(current);

        let entry = Arc::new(SchemaEntry::new(name, source, origin, validator));
        self.snapshot.rcu(|snap| {
            let mut next: Snapshot = (**snap).clone();
            next.insert(name.to_string(), Arc::clone(&entry));
            next
        });

        tracing::info!(schema = %name, origin = ?origin, "Schema registered");
        metrics::record_registry_size(self.len());
        Ok(entry)
    }

    /// Compile a schema that is not stored, resolving `$ref` against the registry.
    pub fn compile_detached(&self, source: &Value) -> Result<Validator, RegistryError> {
        let current = self.snapshot.load();
        let retriever =
            RegistryRetriever::new(current.values().map(|e| (e.name.as_str(), &e.source)));
        compile(source, retriever, self.settings).map_err(|reason| RegistryError::InvalidSchema {
            name: "(inline)".to_string(),
            reason,
        })
    }

    /// Remove a schema by name.
    pub fn remove(&self, name: &str) -> Result<Arc<SchemaEntry>, RegistryError> {
        let mut removed = None;
        self.snapshot.rcu(|snap| {
            let mut next: Snapshot = (**snap).clone();
            removed = next.remove(name);
            next
        });

        match removed {
            Some(entry) => {
                tracing::info!(schema = %name, "Schema removed");
                metrics::record_registry_size(self.len());
                Ok(entry)
            }
            None => Err(RegistryError::NotFound(name.to_string())),
        }
    }

    /// Put `previous` back under `name`, or drop `name` if there was none.
    ///
    /// Undoes a `register` whose follow-up work failed.
    pub fn restore(&self, name: &str, previous: Option<Arc<SchemaEntry>>) {
        self.snapshot.rcu(|snap| {
            let mut next: Snapshot = (**snap).clone();
            match &previous {
                Some(entry) => next.insert(name.to_string(), Arc::clone(entry)),
                None => next.remove(name),
            };
            next
        });
        tracing::warn!(schema = %name, restored = previous.is_some(), "Schema registration rolled back");
        metrics::record_registry_size(self.len());
    }

    pub fn get(&self, name: &str) -> Option<Arc<SchemaEntry>> {
        self.snapshot.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot.load().contains_key(name)
    }

    /// Names of all registered schemas, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// All entries, sorted by name.
    pub fn entries(&self) -> Vec<Arc<SchemaEntry>> {
        let mut entries: Vec<_> = self.snapshot.load().values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Replace every directory-origin schema with the contents of `dir`.
    ///
    /// API-registered schemas are kept unless a file of the same name now
    /// exists. Nothing is published unless every file compiles.
    pub fn load_directory(&self, dir: &Path) -> Result<usize, RegistryError> {
        let files = read_schema_dir(dir)?;

        let current = self.snapshot.load_full();
        let kept_api: Vec<&Arc<SchemaEntry>> = current
            .values()
            .filter(|e| e.origin == SchemaOrigin::Api && !files.contains_key(&e.name))
            .collect();

        let mut compiled = Vec::with_capacity(files.len());
        for (name, source) in &files {
            validate_name(name).map_err(|e| RegistryError::InvalidSchema {
                name: name.clone(),
                reason: format!("file name is not a valid schema name: {e}"),
            })?;
            let retriever = RegistryRetriever::new(
                files
                    .iter()
                    .map(|(n, s)| (n.as_str(), s))
                    .chain(kept_api.iter().map(|e| (e.name.as_str(), &e.source))),
            );
            let validator = compile(source, retriever, self.settings).map_err(|reason| {
                RegistryError::InvalidSchema {
                    name: name.clone(),
                    reason,
                }
            })?;
            compiled.push(Arc::new(SchemaEntry::new(
                name,
                source.clone(),
                SchemaOrigin::Directory,
                validator,
            )));
        }

        self.snapshot.rcu(|snap| {
            let mut next: Snapshot = snap
                .iter()
                .filter(|(name, e)| e.origin == SchemaOrigin::Api && !files.contains_key(*name))
                .map(|(name, e)| (name.clone(), Arc::clone(e)))
                .collect();
            for entry in &compiled {
                next.insert(entry.name.clone(), Arc::clone(entry));
            }
            next
        });

        tracing::info!(
            directory = %dir.display(),
            loaded = compiled.len(),
            total = self.len(),
            "Schema directory loaded"
        );
        metrics::record_registry_size(self.len());
        Ok(compiled.len())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(CompileSettings::default())
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.names())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Schema names are used in URLs and file names.
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.len() > MAX_NAME_LEN {
        Some("longer than 128 characters")
    } else if name.starts_with('.') {
        Some("must not start with '.'")
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        Some("only ASCII letters, digits, '.', '_' and '-' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn address() -> Value {
        json!({
            "$id": "https://example.com/address.json",
            "title": "Address",
            "type": "object",
            "required": ["city"],
            "properties": {"city": {"type": "string"}}
        })
    }

    #[test]
    fn register_and_lookup() {
        let registry = SchemaRegistry::default();
        let entry = registry.register("address", address(), SchemaOrigin::Api).unwrap();

        assert_eq!(entry.id.as_deref(), Some("https://example.com/address.json"));
        assert_eq!(entry.title.as_deref(), Some("Address"));
        assert!(registry.contains("address"));
        assert_eq!(registry.names(), vec!["address"]);
        assert!(entry.validator().is_valid(&json!({"city": "Lima"})));
    }

    #[test]
    fn rejects_bad_names() {
        let registry = SchemaRegistry::default();
        let too_long = "x".repeat(129);
        for name in ["", ".hidden", "a/b", "spaces here", too_long.as_str()] {
            let err = registry.register(name, json!({}), SchemaOrigin::Api).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidName { .. }), "{name:?}");
        }
        assert!(validate_name("order-v2.1_final").is_ok());
    }

    #[test]
    fn rejects_uncompilable_schema_without_publishing() {
        let registry = SchemaRegistry::default();
        let err = registry
            .register("bad", json!({"type": 42}), SchemaOrigin::Api)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn resolves_references_to_registered_schemas() {
        let registry = SchemaRegistry::default();
        registry.register("address", address(), SchemaOrigin::Api).unwrap();
        let person = registry
            .register(
                "person",
                json!({"properties": {"home": {"$ref": "https://example.com/address.json"}}}),
                SchemaOrigin::Api,
            )
            .unwrap();

        assert!(!person.validator().is_valid(&json!({"home": {"city": 7}})));
    }

    #[test]
    fn remove_missing_is_not_found() {
        let registry = SchemaRegistry::default();
        registry.register("address", address(), SchemaOrigin::Api).unwrap();

        assert_eq!(registry.remove("address").unwrap().name, "address");
        assert!(matches!(registry.remove("address"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn restore_reverts_a_registration() {
        let registry = SchemaRegistry::default();
        let original = registry.register("address", address(), SchemaOrigin::Api).unwrap();

        registry.register("address", json!({"type": "null"}), SchemaOrigin::Api).unwrap();
        registry.restore("address", Some(original));
        assert_eq!(registry.get("address").unwrap().source, address());

        registry.register("fresh", json!({}), SchemaOrigin::Api).unwrap();
        registry.restore("fresh", None);
        assert!(!registry.contains("fresh"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn directory_reload_keeps_api_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"type": "string"}"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"type": "integer"}"#).unwrap();

        let registry = SchemaRegistry::default();
        registry.register("api-only", json!({}), SchemaOrigin::Api).unwrap();
        registry.register("b", json!({}), SchemaOrigin::Api).unwrap();
        assert_eq!(registry.load_directory(dir.path()).unwrap(), 2);

        assert_eq!(registry.names(), vec!["a", "api-only", "b"]);
        assert_eq!(registry.get("b").unwrap().origin, SchemaOrigin::Directory);

        fs::remove_file(dir.path().join("a.json")).unwrap();
        registry.load_directory(dir.path()).unwrap();
        assert_eq!(registry.names(), vec!["api-only", "b"]);
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"type": "string"}"#).unwrap();

        let registry = SchemaRegistry::default();
        registry.load_directory(dir.path()).unwrap();

        fs::write(dir.path().join("b.json"), r#"{"type": 42}"#).unwrap();
        let err = registry.load_directory(dir.path()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { ref name, .. } if name == "b"));
        assert_eq!(registry.names(), vec!["a"]);
    }

    #[test]
    fn badly_named_file_fails_reload_as_invalid_schema() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("has space.json"), "{}").unwrap();

        let err = SchemaRegistry::default().load_directory(dir.path()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { ref name, .. } if name == "has space"));
    }

    #[test]
    fn directory_files_reference_each_other() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("item.schema.json"),
            r#"{"type": "object", "required": ["sku"]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("order.schema.json"),
            r#"{"type": "array", "items": {"$ref": "item.schema.json"}}"#,
        )
        .unwrap();

        let registry = SchemaRegistry::default();
        registry.load_directory(dir.path()).unwrap();

        let order = registry.get("order").unwrap();
        assert!(order.validator().is_valid(&json!([{"sku": "A1"}])));
        assert!(!order.validator().is_valid(&json!([{}])));
    }

    #[test]
    fn detached_compile_sees_registry() {
        let registry = SchemaRegistry::default();
        registry.register("address", address(), SchemaOrigin::Api).unwrap();

        let validator = registry
            .compile_detached(&json!({"$ref": "address.json"}))
            .unwrap();
        assert!(validator.is_valid(&json!({"city": "Quito"})));
        assert!(registry.len() == 1);
    }
}
