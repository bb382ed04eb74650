//! Batch indexing and context retrieval over many documents
//!
//! One document at a time: a failing document is logged, its partial
//! artifacts removed, and the run moves on. Documents already indexed stay
//! untouched, so rerunning a job only redoes what failed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::RagIndex;
use super::metadata::MetadataStore;
use super::persistence;
use crate::config::RagConfig;
use crate::embeddings::{Embedder, ModelLoader};
use crate::error::RagResult;
use crate::flat::DistanceBackend;

/// Parsed chunk texts per document
pub trait ChunkSource {
    /// `None` when the document has not been parsed yet
    fn get_chunks(&self, document_id: &str) -> RagResult<Option<Vec<String>>>;
}

impl ChunkSource for HashMap<String, Vec<String>> {
    fn get_chunks(&self, document_id: &str) -> RagResult<Option<Vec<String>>> {
        Ok(self.get(document_id).cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A state file already exists for the document
    AlreadyIndexed,
    /// The chunk source has nothing for the document
    NotParsed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexReport {
    /// `(document_id, chunk count)`
    pub indexed: Vec<(String, usize)>,
    pub skipped: Vec<(String, SkipReason)>,
    /// `(document_id, error message)`
    pub failed: Vec<(String, String)>,
}

impl IndexReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Indexed(usize),
    Skipped(SkipReason),
}

pub struct DocumentIndexer<'a> {
    loader: &'a dyn ModelLoader,
    chunks: &'a dyn ChunkSource,
    metadata: &'a mut dyn MetadataStore,
    state_root: PathBuf,
    model: String,
    backend: DistanceBackend,
    context_top_k: usize,
}

impl<'a> DocumentIndexer<'a> {
    pub fn new(
        config: &RagConfig,
        loader: &'a dyn ModelLoader,
        chunks: &'a dyn ChunkSource,
        metadata: &'a mut dyn MetadataStore,
    ) -> Self {
        Self {
            loader,
            chunks,
            metadata,
            state_root: config.state_root.clone(),
            model: config.model.clone(),
            backend: config.backend,
            context_top_k: config.context_top_k,
        }
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    /// `k` used by [`DocumentIndexer::retrieve_default_context`]
    pub fn context_top_k(&self) -> usize {
        self.context_top_k
    }

    /// Index every document in order. Only a model that cannot be loaded
    /// fails the whole run; per-document errors land in the report.
    pub fn index_documents(&mut self, document_ids: &[String]) -> RagResult<IndexReport> {
        let embedder = self.loader.load_model(&self.model)?;
        let mut report = IndexReport::default();

        for document_id in document_ids {
            match self.index_document(&embedder, document_id) {
                Ok(Outcome::Indexed(chunks)) => {
                    tracing::info!(document_id = %document_id, chunks, "indexed document");
                    report.indexed.push((document_id.clone(), chunks));
                }
                Ok(Outcome::Skipped(reason)) => {
                    tracing::info!(document_id = %document_id, reason = ?reason, "skipped document");
                    report.skipped.push((document_id.clone(), reason));
                }
                Err(e) => {
                    tracing::error!(document_id = %document_id, error = %e, "failed to index document");
                    report.failed.push((document_id.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            indexed = report.indexed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "indexing run finished"
        );
        Ok(report)
    }

    fn index_document(&mut self, embedder: &Arc<dyn Embedder>, document_id: &str) -> RagResult<Outcome> {
        if self.is_indexed(document_id)? {
            return Ok(Outcome::Skipped(SkipReason::AlreadyIndexed));
        }

        let chunks = match self.chunks.get_chunks(document_id)? {
            Some(chunks) => chunks,
            None => return Ok(Outcome::Skipped(SkipReason::NotParsed)),
        };

        let index_path = persistence::index_path(&self.state_root, document_id);
        let state_path = persistence::state_path(&self.state_root, document_id);
        // A vector-only artifact may predate the build; the build overwrites it
        let previous_index = if index_path.exists() {
            Some(std::fs::read(&index_path)?)
        } else {
            None
        };

        match self.build_document(embedder, document_id, &chunks, &state_path) {
            Ok(()) => Ok(Outcome::Indexed(chunks.len())),
            Err(e) => {
                // The state file did not exist before, so anything there is ours
                let _ = std::fs::remove_file(&state_path);
                match previous_index {
                    Some(bytes) => {
                        if let Err(restore) = persistence::atomic_write(&index_path, &bytes) {
                            tracing::error!(
                                document_id,
                                path = %index_path.display(),
                                error = %restore,
                                "failed to restore previous vector index"
                            );
                        }
                    }
                    None => {
                        let _ = std::fs::remove_file(&index_path);
                    }
                }
                Err(e)
            }
        }
    }

    fn build_document(
        &mut self,
        embedder: &Arc<dyn Embedder>,
        document_id: &str,
        chunks: &[String],
        state_path: &Path,
    ) -> RagResult<()> {
        let root = Some(self.state_root.as_path());
        let mut index = RagIndex::new(document_id, Arc::clone(embedder), root).with_backend(self.backend);
        index.add_texts(chunks)?;
        index.save()?;
        self.metadata.record_index_location(document_id, state_path)
    }

    fn is_indexed(&self, document_id: &str) -> RagResult<bool> {
        if let Some(recorded) = self.metadata.get_index_location(document_id)? {
            if recorded.exists() {
                return Ok(true);
            }
        }
        Ok(persistence::state_path(&self.state_root, document_id).exists())
    }

    /// Restore a document's index, preferring the recorded location
    pub fn open_index(&self, document_id: &str) -> RagResult<RagIndex> {
        if let Some(recorded) = self.metadata.get_index_location(document_id)? {
            if recorded.exists() {
                return RagIndex::load_for_document(&recorded, document_id, self.loader, self.backend);
            }
            tracing::warn!(
                document_id,
                path = %recorded.display(),
                "recorded state file is missing, trying default location"
            );
        }
        RagIndex::from_document_id(document_id, &self.state_root, self.loader, self.backend)
    }

    /// Nearest chunk texts for `query`, joined with newlines
    pub fn retrieve_context(&self, document_id: &str, query: &str, k: usize) -> RagResult<String> {
        let index = self.open_index(document_id)?;
        let hits = index.search_text(query, k)?;

        Ok(hits
            .into_iter()
            .map(|(text, _)| text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    pub fn retrieve_default_context(&self, document_id: &str, query: &str) -> RagResult<String> {
        self.retrieve_context(document_id, query, self.context_top_k)
    }
}
