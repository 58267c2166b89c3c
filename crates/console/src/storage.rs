//! Persisted console preferences (key → JSON value).
//!
//! Reads never fail: a missing file, a malformed file or a value that no
//! longer deserializes into the requested type is treated as absent and the
//! caller's default is used. Writes surface their errors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write storage file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Local key/value storage, file-backed or in-memory.
#[derive(Debug)]
pub struct LocalStorage {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl LocalStorage {
    /// Storage that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open file-backed storage. An unreadable or malformed file starts out
    /// empty; it is replaced on the next successful write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// `open` when a path is configured, `in_memory` otherwise.
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read a value; absent or undecodable values yield `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.get(key).cloned()
        }?;

        match serde_json::from_value(raw) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(key, error = %err, "stored value is malformed; treating as absent");
                None
            }
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = entries.insert(key.to_string(), value);

        if let Err(err) = self.persist(&entries) {
            // Keep memory and disk in agreement.
            match previous {
                Some(prev) => entries.insert(key.to_string(), prev),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    /// Remove a key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(previous) = entries.remove(key) else {
            return Ok(false);
        };

        if let Err(err) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(true)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Write the whole map to a sibling temp file, then rename over the
    /// target so readers never observe a half-written file.
    fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let io_err = |source| StorageError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let body = serde_json::to_vec_pretty(entries).map_err(|source| StorageError::Encode {
            key: "*".to_string(),
            source,
        })?;

        let tmp = path.with_extension(format!("{}.tmp", Uuid::now_v7().simple()));
        std::fs::write(&tmp, body).map_err(io_err)?;
        if let Err(err) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(err));
        }

        debug!(path = ?path, keys = entries.len(), "storage persisted");
        Ok(())
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, Value> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            warn!(path = ?path, error = %err, "storage file unreadable; starting empty");
            return BTreeMap::new();
        }
    };

    match serde_json::from_slice::<BTreeMap<String, Value>>(&bytes) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = ?path, error = %err, "storage file malformed; starting empty");
            BTreeMap::new()
        }
    }
}
