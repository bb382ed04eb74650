//! Where each document's state file lives
//!
//! The store holds a path back-reference only; the state file on disk stays
//! the source of truth.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::persistence::atomic_write;
use crate::error::{RagError, RagResult};

pub trait MetadataStore {
    fn record_index_location(&mut self, document_id: &str, state_path: &Path) -> RagResult<()>;

    fn get_index_location(&self, document_id: &str) -> RagResult<Option<PathBuf>>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    locations: HashMap<String, PathBuf>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn record_index_location(&mut self, document_id: &str, state_path: &Path) -> RagResult<()> {
        self.locations
            .insert(document_id.to_string(), state_path.to_path_buf());
        Ok(())
    }

    fn get_index_location(&self, document_id: &str) -> RagResult<Option<PathBuf>> {
        Ok(self.locations.get(document_id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexLocation {
    pub state_path: PathBuf,
    pub recorded_at: DateTime<Utc>,
}

/// Single JSON map `{document_id: {state_path, recorded_at}}`, rewritten
/// atomically on every record
#[derive(Debug)]
pub struct JsonMetadataStore {
    path: PathBuf,
    entries: BTreeMap<String, IndexLocation>,
}

impl JsonMetadataStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> RagResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read(&path)?;
            serde_json::from_slice(&contents).map_err(|e| {
                RagError::Persistence(format!("corrupt metadata store {}: {}", path.display(), e))
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self, document_id: &str) -> Option<&IndexLocation> {
        self.entries.get(document_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush(&self) -> RagResult<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        atomic_write(&self.path, &json).map_err(|e| {
            RagError::Persistence(format!("writing metadata store {}: {}", self.path.display(), e))
        })
    }
}

impl MetadataStore for JsonMetadataStore {
    fn record_index_location(&mut self, document_id: &str, state_path: &Path) -> RagResult<()> {
        let previous = self.entries.insert(
            document_id.to_string(),
            IndexLocation {
                state_path: state_path.to_path_buf(),
                recorded_at: Utc::now(),
            },
        );

        if let Err(e) = self.flush() {
            // Keep memory consistent with disk
            match previous {
                Some(prev) => self.entries.insert(document_id.to_string(), prev),
                None => self.entries.remove(document_id),
            };
            return Err(e);
        }

        tracing::debug!(document_id, path = %state_path.display(), "recorded index location");
        Ok(())
    }

    fn get_index_location(&self, document_id: &str) -> RagResult<Option<PathBuf>> {
        Ok(self.entries.get(document_id).map(|e| e.state_path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryMetadataStore::new();
        assert!(store.get_index_location("d1").unwrap().is_none());

        store.record_index_location("d1", Path::new("/s/d1_rag_state.json")).unwrap();
        assert_eq!(
            store.get_index_location("d1").unwrap(),
            Some(PathBuf::from("/s/d1_rag_state.json"))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta").join("locations.json");

        {
            let mut store = JsonMetadataStore::open(&path).unwrap();
            assert!(store.is_empty());
            store.record_index_location("d1", Path::new("a.json")).unwrap();
            store.record_index_location("d2", Path::new("b.json")).unwrap();
            store.record_index_location("d1", Path::new("c.json")).unwrap();
        }

        let reopened = JsonMetadataStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(
            reopened.get_index_location("d1").unwrap(),
            Some(PathBuf::from("c.json"))
        );
        assert!(reopened.entry("d2").is_some());
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locations.json");
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(matches!(
            JsonMetadataStore::open(&path),
            Err(RagError::Persistence(_))
        ));
    }
}
