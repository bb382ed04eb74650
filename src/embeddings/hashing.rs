// docrag/src/embeddings/hashing.rs
//
// Deterministic feature-hashing embedder. No model files, identical output
// on every platform, so persisted indices and tests stay reproducible.

use crate::embeddings::model::normalize_embeddings;
use crate::embeddings::{Embedder, EmbeddingError};

pub const HASH_MODEL_PREFIX: &str = "hash-";

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Bag-of-tokens embedder: each lowercase alphanumeric token (and each
/// adjacent token pair) is hashed to a signed bucket, then the vector is
/// L2-normalized. Identical texts always produce identical vectors.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    identifier: String,
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            identifier: format!("{}{}", HASH_MODEL_PREFIX, dimensions),
            dimensions,
        }
    }

    /// Parse `hash-<dim>` identifiers
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let dim: usize = identifier.trim().strip_prefix(HASH_MODEL_PREFIX)?.parse().ok()?;
        if dim == 0 {
            return None;
        }
        Some(Self::new(dim))
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];

        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        for token in &tokens {
            self.accumulate(&mut v, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut v, joined.as_bytes(), 0.5);
        }

        v
    }

    fn accumulate(&self, v: &mut [f32], bytes: &[u8], weight: f32) {
        let h = fnv1a(bytes);
        let bucket = (h % self.dimensions as u64) as usize;
        // High bit picks the sign so collisions tend to cancel
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl Embedder for HashEmbedder {
    fn model_identifier(&self) -> &str {
        &self.identifier
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let raw = texts.iter().map(|t| self.embed_text(t)).collect();
        Ok(normalize_embeddings(raw))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(FNV_PRIME))
}
