use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embeddings::{DefaultModelLoader, EmbedConfig};
use crate::error::{RagError, RagResult};
use crate::flat::DistanceBackend;

const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

/// Settings for building and querying per-document indices.
///
/// The index types take explicit arguments; this struct is the convenient
/// way for an application to carry them around and load them from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Folder holding `{id}_rag_index.bin` / `{id}_rag_state.json`
    pub state_root: PathBuf,
    /// ONNX model directories live under here
    pub models_root: PathBuf,
    /// Embedding model for fresh indices
    pub model: String,
    pub backend: DistanceBackend,
    /// Where the document-id -> state-path map is kept
    pub metadata_path: PathBuf,
    /// Default `k` for context retrieval in the pipeline
    pub context_top_k: usize,
    pub embed: EmbedConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            state_root: PathBuf::from("rag_state"),
            models_root: PathBuf::from("models"),
            model: DEFAULT_MODEL.to_string(),
            backend: DistanceBackend::default(),
            metadata_path: PathBuf::from("rag_state").join("index_locations.json"),
            context_top_k: 5,
            embed: EmbedConfig::default(),
        }
    }
}

impl RagConfig {
    pub fn from_toml_str(contents: &str) -> RagResult<Self> {
        let config: RagConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> RagResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> RagResult<()> {
        if self.model.trim().is_empty() {
            return Err(RagError::Config("model must not be empty".to_string()));
        }
        if self.context_top_k == 0 {
            return Err(RagError::Config("context_top_k must be at least 1".to_string()));
        }
        if self.embed.batch_size == 0 {
            return Err(RagError::Config("embed.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Builder: set state root
    pub fn with_state_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.state_root = root.into();
        self
    }

    /// Builder: set embedding model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder: set distance backend
    pub fn with_backend(mut self, backend: DistanceBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Builder: set metadata store path
    pub fn with_metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = path.into();
        self
    }

    /// Model loader over `models_root` using the `[embed]` settings
    pub fn model_loader(&self) -> DefaultModelLoader {
        DefaultModelLoader::new(self.models_root.clone(), self.embed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::PoolingStrategy;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.model, "all-minilm-l6-v2");
        assert_eq!(config.backend, DistanceBackend::Unrolled);
        assert_eq!(config.context_top_k, 5);
    }

    #[test]
    fn test_parse_full_toml() {
        let config = RagConfig::from_toml_str(
            r#"
            state_root = "/var/lib/docrag"
            models_root = "/opt/models"
            model = "bge-small-en-v1.5"
            backend = "ndarray"
            metadata_path = "/var/lib/docrag/meta.json"
            context_top_k = 2

            [embed]
            pooling = "cls"
            normalize = false
            truncate_inputs = true
            batch_size = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.state_root, PathBuf::from("/var/lib/docrag"));
        assert_eq!(config.backend, DistanceBackend::Ndarray);
        assert_eq!(config.context_top_k, 2);
        assert_eq!(config.embed.pooling, PoolingStrategy::Cls);
        assert!(!config.embed.normalize);
        assert!(config.embed.truncate_inputs);
        assert_eq!(config.embed.batch_size, 16);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RagConfig::from_toml_str("model = \"hash-64\"").unwrap();
        assert_eq!(config.model, "hash-64");
        assert_eq!(config.state_root, PathBuf::from("rag_state"));
        assert!(config.embed.normalize);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            RagConfig::from_toml_str("context_top_k = 0"),
            Err(RagError::Config(_))
        ));
        assert!(matches!(
            RagConfig::from_toml_str("backend = \"gpu\""),
            Err(RagError::TomlDe(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("docrag.toml");
        std::fs::write(&path, "state_root = \"state\"\n").unwrap();

        let config = RagConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.state_root, PathBuf::from("state"));
    }
}
