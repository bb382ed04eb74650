//! DocRAG: per-document retrieval index for grounding LLM answers
//!
//! Each document gets its own exact (flat) L2 index over chunk embeddings,
//! with the chunk texts kept position-aligned so a hit maps straight back to
//! its text. Indices persist as a binary vector artifact plus a JSON state
//! record and can be restored by document id.
//!
//! # Architecture
//!
//! ## Search
//! - `flat/` - FlatIndex: exact squared-L2 search, top-k heap, binary format
//! - `embeddings/` - `Embedder` seam: ONNX models via tract, hashing embedder
//!
//! ## Documents
//! - `rag/index.rs` - RagIndex: embed, add, search, save, restore
//! - `rag/persistence.rs` - atomic artifact writes and corruption recovery
//! - `rag/pipeline.rs` - DocumentIndexer: batch indexing, context retrieval
//!
//! # Usage
//! ```
//! use std::sync::Arc;
//! use docrag::embeddings::HashEmbedder;
//! use docrag::rag::RagIndex;
//!
//! let mut index = RagIndex::new("doc-1", Arc::new(HashEmbedder::new(64)), None);
//! index.add_texts(&["first chunk".to_string(), "second chunk".to_string()]).unwrap();
//!
//! let hits = index.search_text("first chunk", 1).unwrap();
//! assert_eq!(hits[0].0, "first chunk");
//! ```

pub mod config;
pub mod embeddings;
pub mod error;
pub mod flat;
pub mod rag;

pub use config::RagConfig;
pub use embeddings::{DefaultModelLoader, Embedder, EmbeddingError, ModelLoader};
pub use error::{RagError, RagResult};
pub use flat::{DistanceBackend, FlatIndex, FlatIndexError};
pub use rag::{DocumentIndexer, RagIndex, TextStore};
