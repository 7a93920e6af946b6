//! Device-scoped key-value storage: the session entry and, in offline mode,
//! the whole data set live here.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
}

pub trait DeviceStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl DeviceStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(std::fs::write(self.path(key)?, value)?)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(key)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn file_storage_round_trips_and_removes() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::open(temp_dir.path().join("device")).unwrap();

        assert_eq!(storage.get("smalltalk-current-user").unwrap(), None);

        storage.set("smalltalk-current-user", r#"{"id":3}"#).unwrap();
        assert_eq!(
            storage.get("smalltalk-current-user").unwrap().as_deref(),
            Some(r#"{"id":3}"#)
        );

        storage.remove("smalltalk-current-user").unwrap();
        assert_eq!(storage.get("smalltalk-current-user").unwrap(), None);

        // removing twice is fine
        storage.remove("smalltalk-current-user").unwrap();
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::open(temp_dir.path()).unwrap();

        assert!(matches!(storage.set("../escape", "x"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(storage.get(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        storage.set("k", "1").unwrap();
        storage.set("k", "2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("2"));
    }
}
