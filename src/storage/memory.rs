//! In-memory artifact store for testing

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::traits::{validate_key, ArtifactStore};
use crate::error::{PodarError, Result};

/// In-memory artifact store. Clones share the same contents.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(e: impl ToString) -> PodarError {
    PodarError::io("artifact store lock", std::io::Error::other(e.to_string()))
}

impl ArtifactStore for InMemoryStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.data
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.data
            .read()
            .map_err(poisoned)?
            .get(key)
            .cloned()
            .ok_or_else(|| PodarError::ArtifactNotFound(key.to_string()))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.data.read().map_err(poisoned)?.contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let removed = self.data.write().map_err(poisoned)?.remove(key);
        if removed.is_none() {
            return Err(PodarError::ArtifactNotFound(key.to_string()));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.data.read().map_err(poisoned)?.keys().cloned().collect())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
