//! Schema files on disk.
//!
//! A schema named `order` lives in `order.schema.json` (or `order.json`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::registry::RegistryError;

const SCHEMA_SUFFIX: &str = ".schema.json";

/// Registry name for a schema file, or `None` if the file is not a schema.
pub fn schema_name_for_file(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.starts_with('.') {
        return None;
    }
    let name = file_name
        .strip_suffix(SCHEMA_SUFFIX)
        .or_else(|| file_name.strip_suffix(".json"))?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Read every schema file in `dir`, keyed by registry name.
pub fn read_schema_dir(dir: &Path) -> Result<BTreeMap<String, Value>, RegistryError> {
    let io_err = |source| RegistryError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut schemas = BTreeMap::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = schema_name_for_file(&path) else {
            continue;
        };

        let content = fs::read_to_string(&path).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
            path: path.clone(),
            source,
        })?;

        if schemas.insert(name.clone(), value).is_some() {
            return Err(RegistryError::InvalidSchema {
                name,
                reason: "defined by more than one file".to_string(),
            });
        }
    }

    Ok(schemas)
}

/// Path a schema is written to when persisted.
pub fn schema_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}{SCHEMA_SUFFIX}"))
}

/// Write `source` as `<dir>/<name>.schema.json`.
pub fn persist(dir: &Path, name: &str, source: &Value) -> Result<PathBuf, RegistryError> {
    fs::create_dir_all(dir).map_err(|source| RegistryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = schema_file_path(dir, name);
    let body = serde_json::to_string_pretty(source).map_err(|source| RegistryError::Parse {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, body).map_err(|source| RegistryError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "Schema persisted");
    Ok(path)
}

/// Remove any file backing `name`. Missing files are not an error.
pub fn unpersist(dir: &Path, name: &str) -> Result<(), RegistryError> {
    for path in [schema_file_path(dir, name), dir.join(format!("{name}.json"))] {
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Schema file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(RegistryError::Io { path, source }),
        }
    }
    Ok(())
}
