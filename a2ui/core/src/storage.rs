//! Key/Value Storage Port
//!
//! Snapshots are written through a tiny storage interface so the core never
//! binds to a concrete persistence medium. Callers inject an implementation
//! at construction; the core only ever calls `get_item`, `set_item` and
//! `remove_item` by name.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStorage`]: process-local map, used by tests and headless runs
//! - [`FileStorage`]: one file per item under a directory (defaults to
//!   `$XDG_DATA_HOME/a2ui`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem access failed
    #[error("Storage I/O failed at {path}: {source}")]
    Io {
        /// File that was being accessed
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Item name cannot be mapped onto the backend
    #[error("Invalid storage item name: {0:?}")]
    InvalidName(String),

    /// Backend is not usable (e.g. no data directory on this platform)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Storage port used for snapshots
pub trait StateStorage: Send + Sync {
    /// Read an item, `None` if it was never written
    fn get_item(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Write (or overwrite) an item
    fn set_item(&self, name: &str, value: &str) -> Result<(), StorageError>;

    /// Delete an item; deleting a missing item is not an error
    fn remove_item(&self, name: &str) -> Result<(), StorageError>;
}

/// Shared storage handle
pub type SharedStorage = Arc<dyn StateStorage>;

// =============================================================================
// In-memory backend
// =============================================================================

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether nothing has been stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl StateStorage for MemoryStorage {
    fn get_item(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().get(name).cloned())
    }

    fn set_item(&self, name: &str, value: &str) -> Result<(), StorageError> {
        self.items.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, name: &str) -> Result<(), StorageError> {
        self.items.write().remove(name);
        Ok(())
    }
}

// =============================================================================
// File backend
// =============================================================================

/// Directory-backed storage, one `<name>.json` file per item
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Use `root` as the storage directory (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage under `$XDG_DATA_HOME/a2ui`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] when the platform has no data
    /// directory.
    pub fn in_data_dir() -> Result<Self, StorageError> {
        default_data_dir()
            .map(Self::new)
            .ok_or_else(|| StorageError::Unavailable("no data directory".to_string()))
    }

    /// Directory this backend writes into
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{name}.json")))
    }
}

impl StateStorage for FileStorage {
    fn get_item(&self, name: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(name)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set_item(&self, name: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        std::fs::create_dir_all(&self.root).map_err(|source| StorageError::Io {
            path: self.root.clone(),
            source,
        })?;

        // Write to a sibling file first so a crash never leaves a torn snapshot
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), bytes = value.len(), "Storage item written");
        Ok(())
    }

    fn remove_item(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// Default data directory: `$XDG_DATA_HOME/a2ui`
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("a2ui"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert!(storage.get_item("surface-store").unwrap().is_none());

        storage.set_item("surface-store", "{}").unwrap();
        assert_eq!(
            storage.get_item("surface-store").unwrap().as_deref(),
            Some("{}")
        );
        assert_eq!(storage.len(), 1);

        storage.remove_item("surface-store").unwrap();
        assert!(storage.is_empty());
        // Removing twice is fine
        storage.remove_item("surface-store").unwrap();
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert!(storage.get_item("surface-store").unwrap().is_none());

        storage.set_item("surface-store", r#"{"a":1}"#).unwrap();
        assert_eq!(
            storage.get_item("surface-store").unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(dir.path().join("nested/surface-store.json").exists());

        storage.remove_item("surface-store").unwrap();
        assert!(storage.get_item("surface-store").unwrap().is_none());
        storage.remove_item("surface-store").unwrap();
    }

    #[test]
    fn test_file_storage_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        assert!(matches!(
            storage.set_item("../escape", "x"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            storage.get_item(""),
            Err(StorageError::InvalidName(_))
        ));
    }
}
