// docrag/src/embeddings/mod.rs
//
// Embedding models behind a single `Embedder` seam.
// Uses `tract-onnx` for pure-Rust ONNX inference.
//
// Supported models:
// - AllMiniLML6V2 (sentence-transformers/all-MiniLM-L6-v2) - 384 dimensions
// - BGESmallENV15 (BAAI/bge-small-en-v1.5) - 384 dimensions, ~130MB
// - ModernBERTBase (nomic-ai/modernbert-embed-base) - 768 dimensions, ~350MB
// - hash-<dim> - deterministic feature hashing, no model files

pub mod config;
pub mod hashing;
pub mod model;
pub mod tokenize;

// Re-exports
pub use config::{EmbedConfig, OnnxModel, PoolingStrategy};
pub use hashing::HashEmbedder;
pub use model::EmbedModel;
pub use tokenize::{EmbedTokenizer, TokenizerError};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Model loading and inference errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Model load failed: {0}")]
    LoadFailed(String),

    #[error("Unknown embedding model: {0}")]
    UnknownModel(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("Shape error: {0}")]
    Shape(String),
}

/// Text to fixed-width vector. `dimensions()` never changes after load and
/// `embed` returns exactly one vector per input, in input order.
pub trait Embedder: Send + Sync {
    /// Identifier this embedder was loaded from, persisted with each index
    fn model_identifier(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InferenceFailed("Empty result".to_string()))
    }
}

/// Resolves a model identifier to a ready embedder
pub trait ModelLoader {
    fn load_model(&self, identifier: &str) -> Result<Arc<dyn Embedder>, EmbeddingError>;
}

/// Loader for the built-in catalogue.
///
/// `hash-<dim>` resolves to [`HashEmbedder`]. Known ONNX models load from
/// `{models_root}/{identifier}/model.onnx` and `tokenizer.json`. Loaded
/// models are not cached; share the returned `Arc` instead of reloading.
#[derive(Debug, Clone)]
pub struct DefaultModelLoader {
    models_root: PathBuf,
    config: EmbedConfig,
}

impl DefaultModelLoader {
    pub fn new(models_root: impl Into<PathBuf>, config: EmbedConfig) -> Self {
        Self {
            models_root: models_root.into(),
            config,
        }
    }

    pub fn models_root(&self) -> &Path {
        &self.models_root
    }

    /// Directory expected to hold the ONNX files for `model`
    pub fn model_dir(&self, model: OnnxModel) -> PathBuf {
        self.models_root.join(model.identifier())
    }
}

impl ModelLoader for DefaultModelLoader {
    fn load_model(&self, identifier: &str) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        if let Some(hashing) = HashEmbedder::from_identifier(identifier) {
            return Ok(Arc::new(hashing));
        }

        let model = OnnxModel::from_identifier(identifier)
            .ok_or_else(|| EmbeddingError::UnknownModel(identifier.to_string()))?;

        let loaded = EmbedModel::from_dir(&self.model_dir(model), model, self.config.clone())?;
        Ok(Arc::new(loaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_hash_model() {
        let loader = DefaultModelLoader::new("models", EmbedConfig::default());
        let embedder = loader.load_model("hash-384").unwrap();
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.model_identifier(), "hash-384");
    }

    #[test]
    fn test_unknown_model() {
        let loader = DefaultModelLoader::new("models", EmbedConfig::default());
        assert!(matches!(
            loader.load_model("not-a-model"),
            Err(EmbeddingError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_onnx_model_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let loader = DefaultModelLoader::new(dir.path(), EmbedConfig::default());
        assert!(matches!(
            loader.load_model("all-MiniLM-L6-v2"),
            Err(EmbeddingError::LoadFailed(_))
        ));
    }

    #[test]
    fn test_model_dir_layout() {
        let loader = DefaultModelLoader::new("/opt/models", EmbedConfig::default());
        assert_eq!(
            loader.model_dir(OnnxModel::BGESmallENV15),
            PathBuf::from("/opt/models/bge-small-en-v1.5")
        );
    }
}
