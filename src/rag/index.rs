//! Per-document retrieval index
//!
//! Couples a [`FlatIndex`] with the [`TextStore`] of chunk texts and the
//! embedder that produced the vectors. `add_texts` and `add_vectors` persist
//! after every successful mutation when the index has a state root.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use super::persistence::{self, RagState, VectorLoad, STATE_FORMAT_VERSION};
use super::text_store::TextStore;
use crate::embeddings::{Embedder, EmbeddingError, ModelLoader};
use crate::error::{RagError, RagResult};
use crate::flat::{DistanceBackend, FlatIndex};

pub struct RagIndex {
    document_id: String,
    embedder: Arc<dyn Embedder>,
    index: FlatIndex,
    texts: TextStore,
    /// `None` for a memory-only index
    state_root: Option<PathBuf>,
    index_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
    vector_load: VectorLoad,
}

impl RagIndex {
    /// Fresh, empty index for `document_id`. With a `state_root` the
    /// artifact paths are derived from the document id; without one the
    /// index is memory-only and never touches disk.
    pub fn new(
        document_id: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        state_root: Option<&Path>,
    ) -> Self {
        let document_id = document_id.into();
        let index = FlatIndex::new(embedder.dimensions());

        Self {
            index_path: state_root.map(|root| persistence::index_path(root, &document_id)),
            state_path: state_root.map(|root| persistence::state_path(root, &document_id)),
            state_root: state_root.map(Path::to_path_buf),
            document_id,
            embedder,
            index,
            texts: TextStore::new(),
            vector_load: VectorLoad::Fresh,
        }
    }

    /// Builder: choose the distance backend
    pub fn with_backend(mut self, backend: DistanceBackend) -> Self {
        self.index.set_backend(backend);
        self
    }

    /// Fresh index whose embedder is resolved through `loader`
    pub fn create(
        document_id: impl Into<String>,
        state_root: &Path,
        model_identifier: &str,
        loader: &dyn ModelLoader,
        backend: DistanceBackend,
    ) -> RagResult<Self> {
        let embedder = loader.load_model(model_identifier)?;
        Ok(Self::new(document_id, embedder, Some(state_root)).with_backend(backend))
    }

    /// Restore a document's index by id. Both artifacts must exist.
    pub fn from_document_id(
        document_id: &str,
        state_root: &Path,
        loader: &dyn ModelLoader,
        backend: DistanceBackend,
    ) -> RagResult<Self> {
        let index_path = persistence::index_path(state_root, document_id);
        let state_path = persistence::state_path(state_root, document_id);

        for path in [&index_path, &state_path] {
            if !path.exists() {
                return Err(RagError::NotFound {
                    document_id: document_id.to_string(),
                    path: path.clone(),
                });
            }
        }

        Self::load_for_document(&state_path, document_id, loader, backend)
    }

    /// [`RagIndex::load_state`], rejecting a state file recorded for another document
    pub fn load_for_document(
        path: &Path,
        document_id: &str,
        loader: &dyn ModelLoader,
        backend: DistanceBackend,
    ) -> RagResult<Self> {
        let restored = Self::load_state(path, loader, backend)?;
        if restored.document_id != document_id {
            return Err(RagError::Persistence(format!(
                "state file {} belongs to document {}, expected {}",
                path.display(),
                restored.document_id,
                document_id
            )));
        }
        Ok(restored)
    }

    /// Restore from a state file, then load the vector artifact it records.
    ///
    /// A missing or corrupt vector artifact leaves the index empty with the
    /// recorded texts intact; [`RagIndex::vector_load`] reports which case
    /// applied. A missing or unreadable state file is an error.
    pub fn load_state(
        path: &Path,
        loader: &dyn ModelLoader,
        backend: DistanceBackend,
    ) -> RagResult<Self> {
        let state = persistence::read_state(path)?;
        let embedder = loader.load_model(&state.model_identifier)?;

        if let Some(dimension) = state.dimension {
            if dimension != embedder.dimensions() {
                return Err(RagError::DimensionMismatch {
                    expected: embedder.dimensions(),
                    got: dimension,
                });
            }
        }

        let (index, vector_load) = match &state.index_path {
            Some(index_path) => {
                persistence::load_vector_index(index_path, embedder.dimensions(), backend)
            }
            None => (
                FlatIndex::with_backend(embedder.dimensions(), backend),
                VectorLoad::Missing,
            ),
        };

        tracing::info!(
            document_id = %state.document_id,
            count = index.count(),
            texts = state.text_store.len(),
            "restored rag index"
        );

        Ok(Self {
            document_id: state.document_id,
            embedder,
            index,
            texts: state.text_store,
            state_root: state.state_folder_path,
            index_path: state.index_path,
            state_path: Some(path.to_path_buf()),
            vector_load,
        })
    }

    /// Restore when both artifacts exist, otherwise start fresh
    pub fn open_or_create(
        document_id: &str,
        state_root: &Path,
        model_identifier: &str,
        loader: &dyn ModelLoader,
        backend: DistanceBackend,
    ) -> RagResult<Self> {
        match Self::from_document_id(document_id, state_root, loader, backend) {
            Err(RagError::NotFound { .. }) => {
                tracing::debug!(document_id, "no persisted index, creating fresh");
                Self::create(document_id, state_root, model_identifier, loader, backend)
            }
            other => other,
        }
    }

    /// Embed `texts` in one call, append vectors and texts together, then
    /// persist both artifacts. No-op on empty input.
    pub fn add_texts(&mut self, texts: &[String]) -> RagResult<()> {
        if texts.is_empty() {
            return Ok(());
        }

        let vectors = self.embedder.embed(texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Shape(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            ))
            .into());
        }

        self.index.add(&vectors)?;
        self.texts.append(texts);

        tracing::debug!(
            document_id = %self.document_id,
            added = texts.len(),
            count = self.index.count(),
            "added texts"
        );

        if let Some(path) = self.state_path.clone() {
            if let Err(e) = self.save_state(&path) {
                tracing::error!(document_id = %self.document_id, error = %e, "failed to persist rag state");
            }
        }
        Ok(())
    }

    /// Append precomputed vectors without texts. Those ordinals have no
    /// text and are skipped by [`RagIndex::search_text`].
    pub fn add_vectors(&mut self, vectors: &[Vec<f32>]) -> RagResult<()> {
        if vectors.is_empty() {
            return Ok(());
        }

        self.index.add(vectors)?;

        if let Some(path) = &self.index_path {
            if let Err(e) = persistence::save_vector_index(&self.index, path) {
                tracing::error!(document_id = %self.document_id, error = %e, "failed to persist vector index");
            }
        }
        Ok(())
    }

    /// Nearest chunk texts to `query`, ascending by squared L2 distance
    pub fn search_text(&self, query: &str, k: usize) -> RagResult<Vec<(String, f32)>> {
        if self.texts.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(query)?;
        let hits = self.index.search(&query_vector, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(ordinal, distance)| {
                self.texts
                    .get(ordinal)
                    .ok()
                    .map(|text| (text.to_string(), distance))
            })
            .collect())
    }

    /// Raw vector search: `(ordinal, distance)` pairs
    pub fn search(&self, query_vector: &[f32], k: usize) -> RagResult<Vec<(usize, f32)>> {
        Ok(self.index.search(query_vector, k)?)
    }

    pub fn get_vector_by_index(&self, ordinal: usize) -> RagResult<Vec<f32>> {
        Ok(self.index.reconstruct(ordinal)?)
    }

    pub fn get_text_by_index(&self, ordinal: usize) -> RagResult<&str> {
        self.texts.get(ordinal)
    }

    /// Write the vector artifact and the state record at `path`. Errors
    /// propagate.
    ///
    /// A memory-only index writes its vectors beside `path` as
    /// `{document_id}_rag_index.bin` and records that location in the
    /// state; the index itself stays memory-only.
    pub fn save_state(&self, path: &Path) -> RagResult<()> {
        let mut state = self.to_state();
        let index_path = match &self.index_path {
            Some(index_path) => index_path.clone(),
            None => {
                let folder = path.parent().unwrap_or_else(|| Path::new(""));
                state.state_folder_path = Some(folder.to_path_buf());
                persistence::index_path(folder, &self.document_id)
            }
        };

        persistence::save_vector_index(&self.index, &index_path)?;
        state.index_path = Some(index_path);
        persistence::write_state(&state, path)
    }

    /// Save to this index's own state path. Memory-only indices do nothing.
    pub fn save(&self) -> RagResult<()> {
        match &self.state_path {
            Some(path) => self.save_state(path),
            None => {
                tracing::debug!(document_id = %self.document_id, "memory-only index, nothing to save");
                Ok(())
            }
        }
    }

    pub fn to_state(&self) -> RagState {
        RagState {
            document_id: self.document_id.clone(),
            model_identifier: self.embedder.model_identifier().to_string(),
            index_path: self.index_path.clone(),
            text_store: self.texts.clone(),
            state_folder_path: self.state_root.clone(),
            dimension: Some(self.index.dimension()),
            format_version: STATE_FORMAT_VERSION,
            saved_at: Some(Utc::now()),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn model_identifier(&self) -> &str {
        self.embedder.model_identifier()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Number of stored vectors
    pub fn count(&self) -> usize {
        self.index.count()
    }

    pub fn text_count(&self) -> usize {
        self.texts.len()
    }

    pub fn texts(&self) -> &[String] {
        self.texts.as_slice()
    }

    pub fn backend(&self) -> DistanceBackend {
        self.index.backend()
    }

    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    pub fn state_root(&self) -> Option<&Path> {
        self.state_root.as_deref()
    }

    /// How the vector artifact was obtained when this index was built
    pub fn vector_load(&self) -> &VectorLoad {
        &self.vector_load
    }
}

impl fmt::Debug for RagIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagIndex")
            .field("document_id", &self.document_id)
            .field("model", &self.embedder.model_identifier())
            .field("dimension", &self.index.dimension())
            .field("count", &self.index.count())
            .field("texts", &self.texts.len())
            .field("state_path", &self.state_path)
            .finish()
    }
}
