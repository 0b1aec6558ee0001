//! Local filesystem artifact store

use chrono::Utc;
use std::path::{Path, PathBuf};

use super::traits::{validate_key, ArtifactStore};
use crate::error::{PodarError, Result};

/// Filesystem store rooted at one run directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root` without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store and ensure its root directory exists.
    pub fn new_and_init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| PodarError::io(format!("creating {}", root.display()), e))?;
        Ok(Self { root })
    }

    /// Create a store for a new run under `<log_dir>/<run_id>`, where the run
    /// id is the current UTC time.
    pub fn new_run(log_dir: impl AsRef<Path>) -> Result<Self> {
        Self::new_and_init(log_dir.as_ref().join(run_id()))
    }

    /// Run directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    fn collect_keys(&self, dir: &Path, prefix: &str, keys: &mut Vec<String>) -> Result<()> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| PodarError::io(format!("listing {}", dir.display()), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PodarError::io(format!("listing {}", dir.display()), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let path = entry.path();
            if path.is_dir() {
                self.collect_keys(&path, &key, keys)?;
            } else {
                keys.push(key);
            }
        }
        Ok(())
    }
}

/// Run identifier: `%Y-%m-%d-%H-%M-%S-%6f` (microseconds) in UTC.
pub fn run_id() -> String {
    Utc::now().format("%Y-%m-%d-%H-%M-%S-%6f").to_string()
}

impl ArtifactStore for LocalStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PodarError::io(format!("creating {}", parent.display()), e))?;
        }
        std::fs::write(&path, data).map_err(|e| PodarError::io(format!("writing {}", path.display()), e))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.key_to_path(key)?;
        if !path.is_file() {
            return Err(PodarError::ArtifactNotFound(key.to_string()));
        }
        std::fs::read(&path).map_err(|e| PodarError::io(format!("reading {}", path.display()), e))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.key_to_path(key)?.is_file())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_to_path(key)?;
        if !path.is_file() {
            return Err(PodarError::ArtifactNotFound(key.to_string()));
        }
        std::fs::remove_file(&path).map_err(|e| PodarError::io(format!("removing {}", path.display()), e))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if self.root.is_dir() {
            self.collect_keys(&self.root, "", &mut keys)?;
        }
        keys.sort();
        Ok(keys)
    }

    fn store_type(&self) -> &'static str {
        "local"
    }
}
