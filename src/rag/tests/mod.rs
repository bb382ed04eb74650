mod persistence_tests;

use std::sync::Arc;

use crate::embeddings::{Embedder, EmbeddingError, HashEmbedder, ModelLoader};

/// Loader that resolves any `hash-<dim>` id and the `poisoned` model
pub(crate) struct TestLoader;

impl ModelLoader for TestLoader {
    fn load_model(&self, identifier: &str) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        if identifier == PoisonedEmbedder::IDENTIFIER {
            return Ok(Arc::new(PoisonedEmbedder(HashEmbedder::new(16))));
        }
        HashEmbedder::from_identifier(identifier)
            .map(|e| Arc::new(e) as Arc<dyn Embedder>)
            .ok_or_else(|| EmbeddingError::UnknownModel(identifier.to_string()))
    }
}

/// Fails on any batch containing the word "poison"
pub(crate) struct PoisonedEmbedder(HashEmbedder);

impl PoisonedEmbedder {
    pub const IDENTIFIER: &'static str = "poisoned";
}

impl Embedder for PoisonedEmbedder {
    fn model_identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn dimensions(&self) -> usize {
        self.0.dimensions()
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.iter().any(|t| t.contains("poison")) {
            return Err(EmbeddingError::InferenceFailed("poisoned input".to_string()));
        }
        self.0.embed(texts)
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn hash_embedder(dim: usize) -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(dim))
}
