//! Engine configuration sources
//!
//! Each job takes one snapshot of the engine configuration when it starts, so
//! a reload never changes the rules of a job already running.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use crate::model::EngineConfig;
use crate::model::config::{ConfigError, ConfigFile};

pub trait ConfigProvider: Send + Sync {
    /// Snapshot of the configuration for the next job
    fn current(&self) -> Arc<EngineConfig>;
}

/// Fixed configuration
pub struct StaticConfigProvider {
    config: Arc<EngineConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn current(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.config)
    }
}

struct Loaded {
    config: Arc<EngineConfig>,
    modified: Option<SystemTime>,
}

/// YAML file re-read whenever its modification time changes
///
/// A file that fails to parse or validate is logged and ignored; the last
/// good configuration stays in effect until the file changes again.
pub struct FileConfigProvider {
    path: PathBuf,
    loaded: Mutex<Loaded>,
}

impl FileConfigProvider {
    /// Start from the file if it loads, else from `fallback`
    pub fn new(path: impl Into<PathBuf>, fallback: EngineConfig) -> Self {
        let path = path.into();
        let modified = modified_time(&path);
        let config = match load_engine_config(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "Engine config file not usable, starting from defaults"
                );
                fallback
            }
        };

        Self {
            path,
            loaded: Mutex::new(Loaded {
                config: Arc::new(config),
                modified,
            }),
        }
    }
}

impl ConfigProvider for FileConfigProvider {
    fn current(&self) -> Arc<EngineConfig> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);

        let modified = modified_time(&self.path);
        if modified.is_some() && modified != loaded.modified {
            loaded.modified = modified;
            match load_engine_config(&self.path) {
                Ok(config) => {
                    tracing::info!(path = %self.path.display(), "Reloaded engine configuration");
                    loaded.config = Arc::new(config);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Ignoring invalid engine configuration, keeping previous"
                    );
                }
            }
        }

        Arc::clone(&loaded.config)
    }
}

fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let file = ConfigFile::load(path)?;
    file.engine.validate()?;
    Ok(file.engine)
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::Duration;

    fn write_config(path: &Path, contents: &str, age: u64) {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        // Explicit mtimes, so the test never depends on filesystem timestamp granularity
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + age);
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn test_static_provider_returns_same_config() {
        let provider = StaticConfigProvider::new(EngineConfig::default());
        assert!(Arc::ptr_eq(&provider.current(), &provider.current()));
    }

    #[test]
    fn test_file_changes_apply_to_next_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        write_config(&path, "engine:\n  max_contexts: 3\n", 0);

        let provider = FileConfigProvider::new(&path, EngineConfig::default());
        let first = provider.current();
        assert_eq!(first.max_contexts, 3);

        write_config(&path, "engine:\n  max_contexts: 4\n  max_batch_size: 2\n", 10);
        let second = provider.current();
        assert_eq!(second.max_contexts, 4);
        assert_eq!(second.max_batch_size, 2);
        // The earlier snapshot is untouched
        assert_eq!(first.max_contexts, 3);
    }

    #[test]
    fn test_invalid_update_keeps_last_good_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        write_config(&path, "engine:\n  max_contexts: 2\n", 0);
        let provider = FileConfigProvider::new(&path, EngineConfig::default());

        write_config(&path, "engine:\n  max_contexts: 0\n", 10);
        assert_eq!(provider.current().max_contexts, 2);

        write_config(&path, "engine: [not, a, map", 20);
        assert_eq!(provider.current().max_contexts, 2);

        write_config(&path, "engine:\n  max_contexts: 6\n", 30);
        assert_eq!(provider.current().max_contexts, 6);
    }

    #[test]
    fn test_missing_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = EngineConfig {
            max_contexts: 7,
            ..EngineConfig::default()
        };
        let provider = FileConfigProvider::new(dir.path().join("absent.yaml"), fallback);
        assert_eq!(provider.current().max_contexts, 7);
    }
}
