//! Schema directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::registry::store::SchemaRegistry;

/// A watcher that reloads the registry when the schema directory changes.
pub struct SchemaWatcher {
    path: PathBuf,
    registry: Arc<SchemaRegistry>,
}

impl SchemaWatcher {
    pub fn new(path: &Path, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            path: path.to_path_buf(),
            registry,
        }
    }

    /// Start watching the directory in a background thread.
    ///
    /// The returned watcher stops when dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let registry = Arc::clone(&self.registry);
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::info!(paths = ?event.paths, "Schema directory change detected, reloading...");
                        if let Err(e) = registry.load_directory(&path) {
                            tracing::error!(
                                error = %e,
                                "Failed to reload schemas. Keeping current registry."
                            );
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Schema watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;

    #[test]
    fn picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SchemaRegistry::default());
        let _watcher = SchemaWatcher::new(dir.path(), Arc::clone(&registry))
            .run()
            .unwrap();

        fs::write(dir.path().join("late.json"), r#"{"type": "boolean"}"#).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !registry.contains("late") && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(registry.contains("late"));
    }
}
