// docrag/src/embeddings/config.rs
//
// Configuration types for the embedding pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported ONNX models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnnxModel {
    /// all-MiniLM-L6-v2 - 384 dimensions, lightweight
    #[serde(rename = "all-minilm-l6-v2")]
    AllMiniLML6V2,

    /// BAAI/bge-small-en-v1.5 - 384 dimensions, fast
    #[serde(rename = "bge-small-en-v1.5")]
    BGESmallENV15,

    /// nomic-ai/modernbert-embed-base - 768 dimensions, high quality
    #[serde(rename = "modernbert-embed-base")]
    ModernBERTBase,
}

impl Default for OnnxModel {
    fn default() -> Self {
        Self::AllMiniLML6V2
    }
}

impl fmt::Display for OnnxModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl OnnxModel {
    pub const ALL: [OnnxModel; 3] = [
        OnnxModel::AllMiniLML6V2,
        OnnxModel::BGESmallENV15,
        OnnxModel::ModernBERTBase,
    ];

    /// Resolve a model identifier: canonical name, short alias, or HuggingFace id
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let id = identifier.trim().to_ascii_lowercase();
        match id.as_str() {
            "all-minilm-l6-v2" | "minilm" | "sentence-transformers/all-minilm-l6-v2" => {
                Some(Self::AllMiniLML6V2)
            }
            "bge-small" | "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => {
                Some(Self::BGESmallENV15)
            }
            "modernbert-base" | "modernbert-embed-base" | "nomic-ai/modernbert-embed-base" => {
                Some(Self::ModernBERTBase)
            }
            _ => None,
        }
    }

    /// Canonical identifier, recorded in persisted state
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::AllMiniLML6V2 => "all-minilm-l6-v2",
            Self::BGESmallENV15 => "bge-small-en-v1.5",
            Self::ModernBERTBase => "modernbert-embed-base",
        }
    }

    /// Get the expected embedding dimensions for this model
    pub fn dimensions(&self) -> usize {
        match self {
            Self::AllMiniLML6V2 => 384,
            Self::BGESmallENV15 => 384,
            Self::ModernBERTBase => 768,
        }
    }

    /// Get the maximum sequence length for this model
    pub fn max_length(&self) -> usize {
        match self {
            Self::AllMiniLML6V2 => 512,
            Self::BGESmallENV15 => 512,
            Self::ModernBERTBase => 8192,
        }
    }

    /// Get HuggingFace model ID
    pub fn hf_model_id(&self) -> &'static str {
        match self {
            Self::AllMiniLML6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            Self::BGESmallENV15 => "BAAI/bge-small-en-v1.5",
            Self::ModernBERTBase => "nomic-ai/modernbert-embed-base",
        }
    }

    /// Check if model supports Matryoshka Representation Learning (MRL)
    /// MRL models front-load signal, so truncation preserves quality
    pub fn supports_matryoshka(&self) -> bool {
        matches!(self, Self::BGESmallENV15 | Self::ModernBERTBase)
    }
}

/// Pooling strategy for converting token embeddings to sentence embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoolingStrategy {
    /// Mean pooling over all tokens (most common)
    #[default]
    Mean,

    /// Use [CLS] token embedding
    Cls,

    /// Max pooling over tokens
    Max,
}

/// Embedding pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Matryoshka truncation dimension (None = full dimensions)
    /// Only effective for models that support MRL
    pub truncate_dim: Option<usize>,

    /// Maximum number of texts sent to the model per inference call
    pub batch_size: usize,

    /// Pooling strategy
    pub pooling: PoolingStrategy,

    /// Whether to normalize embeddings (L2)
    pub normalize: bool,

    /// Silently cut inputs at the model's token limit instead of failing
    pub truncate_inputs: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            truncate_dim: None,
            batch_size: 32,
            pooling: PoolingStrategy::default(),
            normalize: true,
            truncate_inputs: false,
        }
    }
}

impl EmbedConfig {
    /// Builder: set batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Builder: set truncation dimension (Matryoshka)
    pub fn with_truncate_dim(mut self, dim: usize) -> Self {
        self.truncate_dim = Some(dim);
        self
    }

    /// Builder: truncate over-long inputs instead of rejecting them
    pub fn with_truncate_inputs(mut self, truncate: bool) -> Self {
        self.truncate_inputs = truncate;
        self
    }

    /// Get effective embedding dimension (after truncation) for `model`
    pub fn effective_dim(&self, model: OnnxModel) -> usize {
        match self.truncate_dim {
            Some(dim) if model.supports_matryoshka() => dim.min(model.dimensions()),
            _ => model.dimensions(),
        }
    }
}
