//! Persistence of applied shapes.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::record::SchemeRecord;
use crate::error::Result;

/// Keyed storage of scheme records, one per table.
///
/// Stores make no promise across keys. A migration is atomic through its
/// SQL transaction, not through the store.
pub trait SchemeStore: Send + Sync {
    /// Returns every stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load(&self) -> Result<Vec<(String, SchemeRecord)>>;

    /// Returns the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<SchemeRecord>>;

    /// Stores `record` under `key`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn put(&self, key: &str, record: &SchemeRecord) -> Result<()>;

    /// Removes the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Records kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SchemeRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchemeStore for MemoryStore {
    fn load(&self) -> Result<Vec<(String, SchemeRecord)>> {
        Ok(self
            .records
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn get(&self, key: &str) -> Result<Option<SchemeRecord>> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn put(&self, key: &str, record: &SchemeRecord) -> Result<()> {
        self.records.lock().insert(key.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.records.lock().remove(key);
        Ok(())
    }
}

/// Records kept in a pretty-printed JSON file.
///
/// The whole file is rewritten on every change, through a sibling temp
/// file renamed over the original.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, SchemeRecord>>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), records = records.len(), "Scheme file loaded");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, records: &BTreeMap<String, SchemeRecord>) -> Result<()> {
        let content = serde_json::to_string_pretty(records)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SchemeStore for JsonFileStore {
    fn load(&self) -> Result<Vec<(String, SchemeRecord)>> {
        Ok(self
            .records
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn get(&self, key: &str) -> Result<Option<SchemeRecord>> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn put(&self, key: &str, record: &SchemeRecord) -> Result<()> {
        let mut records = self.records.lock();
        let previous = records.insert(key.to_string(), record.clone());
        if let Err(err) = self.flush(&records) {
            match previous {
                Some(previous) => records.insert(key.to_string(), previous),
                None => records.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut records = self.records.lock();
        if let Some(previous) = records.remove(key) {
            if let Err(err) = self.flush(&records) {
                records.insert(key.to_string(), previous);
                return Err(err);
            }
        }
        Ok(())
    }
}
