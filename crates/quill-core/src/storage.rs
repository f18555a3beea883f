//! Snapshot persistence collaborators.
//!
//! The store and the ledger delegate durability to these traits; callers
//! catch and log failures rather than letting them interrupt a mutation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::Quote;
use crate::sync::Conflict;

/// Persistence collaborator for the quote snapshot.
pub trait QuoteStorage: Send + Sync {
    /// Persist the full quote list.
    fn save(&self, quotes: &[Quote]) -> Result<()>;

    /// Load the persisted quote list; `None` when no snapshot exists.
    fn load(&self) -> Result<Option<Vec<Quote>>>;
}

/// Persistence collaborator for pending conflicts.
pub trait ConflictStorage: Send + Sync {
    /// Persist the pending conflict list.
    fn save(&self, conflicts: &[Conflict]) -> Result<()>;

    /// Load the pending conflict list; `None` when no snapshot exists.
    fn load(&self) -> Result<Option<Vec<Conflict>>>;
}

impl<S: QuoteStorage + ?Sized> QuoteStorage for std::sync::Arc<S> {
    fn save(&self, quotes: &[Quote]) -> Result<()> {
        (**self).save(quotes)
    }

    fn load(&self) -> Result<Option<Vec<Quote>>> {
        (**self).load()
    }
}

impl<S: ConflictStorage + ?Sized> ConflictStorage for std::sync::Arc<S> {
    fn save(&self, conflicts: &[Conflict]) -> Result<()> {
        (**self).save(conflicts)
    }

    fn load(&self) -> Result<Option<Vec<Conflict>>> {
        (**self).load()
    }
}

/// JSON snapshot file storage.
///
/// One pretty-printed JSON document per file; a missing file reads as an
/// absent snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Storage backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(value)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let payload = match fs::read_to_string(&self.path) {
            Ok(payload) => payload,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }
}

impl QuoteStorage for JsonFileStorage {
    fn save(&self, quotes: &[Quote]) -> Result<()> {
        self.write(&quotes)
    }

    fn load(&self) -> Result<Option<Vec<Quote>>> {
        self.read()
    }
}

impl ConflictStorage for JsonFileStorage {
    fn save(&self, conflicts: &[Conflict]) -> Result<()> {
        self.write(&conflicts)
    }

    fn load(&self) -> Result<Option<Vec<Conflict>>> {
        self.read()
    }
}

/// In-memory storage (useful for testing and embedding).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    cell: Mutex<Option<String>>,
}

impl MemoryStorage {
    /// Empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let mut cell = self
            .cell
            .lock()
            .map_err(|_| Error::Storage("memory storage poisoned".to_string()))?;
        *cell = Some(payload);
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let cell = self
            .cell
            .lock()
            .map_err(|_| Error::Storage("memory storage poisoned".to_string()))?;
        match cell.as_deref() {
            Some(payload) => Ok(Some(serde_json::from_str(payload)?)),
            None => Ok(None),
        }
    }
}

impl QuoteStorage for MemoryStorage {
    fn save(&self, quotes: &[Quote]) -> Result<()> {
        self.write(&quotes)
    }

    fn load(&self) -> Result<Option<Vec<Quote>>> {
        self.read()
    }
}

impl ConflictStorage for MemoryStorage {
    fn save(&self, conflicts: &[Conflict]) -> Result<()> {
        self.write(&conflicts)
    }

    fn load(&self) -> Result<Option<Vec<Conflict>>> {
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn json_file_round_trips_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("quotes.json"));

        assert!(QuoteStorage::load(&storage).unwrap().is_none());

        let quotes = vec![Quote::new("A", "X"), Quote::new("B", "Y")];
        QuoteStorage::save(&storage, &quotes).unwrap();

        let loaded = QuoteStorage::load(&storage).unwrap().unwrap();
        assert_eq!(loaded, quotes);
    }

    #[test]
    fn json_file_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested").join("quotes.json"));

        QuoteStorage::save(&storage, &[Quote::new("A", "X")]).unwrap();
        assert_eq!(QuoteStorage::load(&storage).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn json_file_rejects_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = JsonFileStorage::new(path);
        assert!(QuoteStorage::load(&storage).is_err());
    }

    #[test]
    fn memory_storage_round_trips_quotes() {
        let storage = MemoryStorage::new();
        assert!(QuoteStorage::load(&storage).unwrap().is_none());

        let quotes = vec![Quote::new("A", "X")];
        QuoteStorage::save(&storage, &quotes).unwrap();
        assert_eq!(QuoteStorage::load(&storage).unwrap().unwrap(), quotes);
    }
}
