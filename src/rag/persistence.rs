//! Durable artifacts for a document index
//!
//! Each document owns two files under its state root:
//! - `{id}_rag_index.bin`: the flat index in its native binary form
//! - `{id}_rag_state.json`: document id, model, paths and the text store
//!
//! Both are written to a sibling `.tmp` file and renamed into place, so a
//! failed write leaves the previous artifact intact.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_store::TextStore;
use crate::error::{RagError, RagResult};
use crate::flat::{DistanceBackend, FlatIndex};

pub const INDEX_FILE_SUFFIX: &str = "_rag_index.bin";
pub const STATE_FILE_SUFFIX: &str = "_rag_state.json";
pub const STATE_FORMAT_VERSION: u32 = 1;

pub fn index_path(state_root: &Path, document_id: &str) -> PathBuf {
    state_root.join(format!("{}{}", document_id, INDEX_FILE_SUFFIX))
}

pub fn state_path(state_root: &Path, document_id: &str) -> PathBuf {
    state_root.join(format!("{}{}", document_id, STATE_FILE_SUFFIX))
}

/// Best-effort document id from a state file name, for error messages
pub fn document_id_from_state_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.strip_suffix(STATE_FILE_SUFFIX).unwrap_or(n).to_string())
        .unwrap_or_default()
}

/// Serialized metadata record for one document index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagState {
    pub document_id: String,
    pub model_identifier: String,
    /// `None` when the index was memory-only and no vector artifact exists
    pub index_path: Option<PathBuf>,
    pub text_store: TextStore,
    pub state_folder_path: Option<PathBuf>,
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub format_version: u32,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// How the vector artifact was obtained during a load
#[derive(Debug, Clone, PartialEq)]
pub enum VectorLoad {
    /// Fresh index, nothing was read
    Fresh,
    /// Artifact read and decoded
    Loaded,
    /// No artifact on disk; started empty
    Missing,
    /// Artifact unreadable or corrupt; started empty. Holds the reason.
    Recovered(String),
}

/// Write `bytes` to `path` through a temporary sibling and an atomic rename
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

pub fn save_vector_index(index: &FlatIndex, path: &Path) -> RagResult<()> {
    let bytes = index.serialize();
    atomic_write(path, &bytes).map_err(|e| {
        RagError::Persistence(format!("writing vector index {}: {}", path.display(), e))
    })?;

    tracing::info!(path = %path.display(), count = index.count(), "saved vector index");
    Ok(())
}

/// Load the vector artifact, degrading to an empty index of `dimension`
/// when the file is missing or cannot be decoded. Never fails: corruption
/// is logged and reported through [`VectorLoad::Recovered`].
pub fn load_vector_index(
    path: &Path,
    dimension: usize,
    backend: DistanceBackend,
) -> (FlatIndex, VectorLoad) {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no vector index on disk, starting empty");
        return (FlatIndex::with_backend(dimension, backend), VectorLoad::Missing);
    }

    let decoded = fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| FlatIndex::deserialize(&bytes, backend).map_err(|e| e.to_string()))
        .and_then(|index| {
            if index.dimension() == dimension {
                Ok(index)
            } else {
                Err(format!(
                    "artifact dimension {} does not match model dimension {}",
                    index.dimension(),
                    dimension
                ))
            }
        });

    match decoded {
        Ok(index) => {
            tracing::info!(path = %path.display(), count = index.count(), "loaded vector index");
            (index, VectorLoad::Loaded)
        }
        Err(reason) => {
            tracing::warn!(
                path = %path.display(),
                error = %reason,
                "failed to load vector index, re-initializing empty index"
            );
            (FlatIndex::with_backend(dimension, backend), VectorLoad::Recovered(reason))
        }
    }
}

pub fn write_state(state: &RagState, path: &Path) -> RagResult<()> {
    let json = serde_json::to_vec_pretty(state)?;
    atomic_write(path, &json).map_err(|e| {
        RagError::Persistence(format!("writing state {}: {}", path.display(), e))
    })?;

    tracing::info!(
        document_id = %state.document_id,
        path = %path.display(),
        texts = state.text_store.len(),
        "saved rag state"
    );
    Ok(())
}

pub fn read_state(path: &Path) -> RagResult<RagState> {
    if !path.exists() {
        return Err(RagError::NotFound {
            document_id: document_id_from_state_path(path),
            path: path.to_path_buf(),
        });
    }

    let contents = fs::read(path)?;
    serde_json::from_slice(&contents).map_err(|e| {
        RagError::Persistence(format!("corrupt state file {}: {}", path.display(), e))
    })
}
