//! Key-value persistence with file locking.
//!
//! Profile records are persisted through the [`KeyValueStore`] trait so the
//! calorie computation never touches storage directly. [`JsonFileStore`]
//! keeps one JSON document per key on disk; [`MemoryStore`] keeps them in
//! process.

use crate::{Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Edit applied by [`KeyValueStore::update`]: receives the current value and
/// returns the replacement, or `None` to leave the stored value as it is.
pub type Edit<'a> = dyn FnMut(Option<String>) -> Result<Option<String>> + 'a;

/// String-valued key-value store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
    /// Returns true if the key existed
    fn remove(&self, key: &str) -> Result<bool>;

    /// Read-modify-write of one key. No other writer to `key` can run
    /// between the read and the write.
    fn update(&self, key: &str, edit: &mut Edit<'_>) -> Result<()>;
}

/// In-process store, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn update(&self, key: &str, edit: &mut Edit<'_>) -> Result<()> {
        let mut entries = self.lock()?;
        if let Some(next) = edit(entries.get(key).cloned())? {
            entries.insert(key.to_string(), next);
        }
        Ok(())
    }
}

/// Directory-backed store: each key lives in `<dir>/<key>.json`.
///
/// Writers to a key serialize on an exclusive lock over `<dir>/<key>.lock`.
/// The lock file is never renamed or removed, so every process contends on
/// the same inode even while the value file is being replaced.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Take the writer lock for `key`; released when the file is dropped
    fn lock_key(&self, key: &str) -> Result<File> {
        validate_key(key)?;
        std::fs::create_dir_all(&self.dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.dir.join(format!("{}.lock", key)))?;
        lock.lock_exclusive()?;
        Ok(lock)
    }

    /// Replace the value file by temp file, fsync and rename
    fn write_value(&self, path: &Path, value: &str) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(value.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::Store(format!("invalid key '{}'", key)))
    }
}

fn read_value(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl KeyValueStore for JsonFileStore {
    /// Values are only ever replaced by rename, so a lock-free read sees
    /// either the old or the new document, never a mix.
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        let value = read_value(&path)?;
        match &value {
            Some(_) => tracing::debug!("Loaded '{}' from {:?}", key, path),
            None => tracing::debug!("No stored value for '{}' at {:?}", key, path),
        }
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let lock = self.lock_key(key)?;

        self.write_value(&path, value)?;
        lock.unlock()?;

        tracing::debug!("Saved '{}' to {:?}", key, path);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        let lock = self.lock_key(key)?;

        let removed = match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        lock.unlock()?;

        if removed {
            tracing::debug!("Removed '{}' at {:?}", key, path);
        }
        Ok(removed)
    }

    fn update(&self, key: &str, edit: &mut Edit<'_>) -> Result<()> {
        let path = self.path_for(key)?;
        let lock = self.lock_key(key)?;

        if let Some(next) = edit(read_value(&path)?)? {
            self.write_value(&path, &next)?;
            tracing::debug!("Updated '{}' at {:?}", key, path);
        }
        lock.unlock()?;
        Ok(())
    }
}
