//! Per-document retrieval: exact flat index + aligned chunk texts
//!
//! # Architecture
//! ```text
//! ChunkSource → Embedder → FlatIndex (ordinal i) ─┐
//!                          TextStore (text i) ────┴→ {id}_rag_index.bin
//!                                                    {id}_rag_state.json
//! Query → Embedder → FlatIndex::search → TextStore → (text, distance)
//! ```

pub mod chunker;
pub mod index;
pub mod metadata;
pub mod persistence;
pub mod pipeline;
pub mod text_store;

pub use chunker::{Chunk, MarkdownChunkSource, SectionChunker};
pub use index::RagIndex;
pub use metadata::{IndexLocation, JsonMetadataStore, MemoryMetadataStore, MetadataStore};
pub use persistence::{RagState, VectorLoad};
pub use pipeline::{ChunkSource, DocumentIndexer, IndexReport, SkipReason};
pub use text_store::TextStore;

#[cfg(test)]
mod tests;
