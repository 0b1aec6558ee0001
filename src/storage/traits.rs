//! Artifact store trait

use crate::error::{PodarError, Result};

/// Key-addressed byte store backing a pruning run.
///
/// Keys are `/`-separated relative paths such as
/// `intermediate_result/3_config_list.json`.
pub trait ArtifactStore: Send + Sync + std::fmt::Debug {
    /// Store bytes under a key, replacing any previous value.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Retrieve the bytes stored under a key.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Check if a key exists
    fn exists(&self, key: &str) -> Result<bool>;

    /// Delete a key
    fn delete(&self, key: &str) -> Result<()>;

    /// All keys, sorted.
    fn list(&self) -> Result<Vec<String>>;

    /// Get store type name
    fn store_type(&self) -> &'static str;
}

/// Reject keys that are empty, absolute or escape the store root.
pub fn validate_key(key: &str) -> Result<()> {
    let escapes = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if key.is_empty() || escapes {
        return Err(PodarError::config("artifact key", format!("invalid key '{key}'")));
    }
    Ok(())
}
