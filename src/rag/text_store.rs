//! Ordered chunk texts, positionally aligned with vector-index ordinals.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, RagResult};

/// Text `i` belongs to vector ordinal `i` as long as texts and their
/// embeddings are always appended together and in the same order.
/// Vector-only additions push the index ahead of the store; those trailing
/// ordinals have no text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextStore {
    texts: Vec<String>,
}

impl TextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_texts(texts: Vec<String>) -> Self {
        Self { texts }
    }

    pub fn append(&mut self, texts: &[String]) {
        self.texts.extend_from_slice(texts);
    }

    pub fn get(&self, ordinal: usize) -> RagResult<&str> {
        self.texts
            .get(ordinal)
            .map(String::as_str)
            .ok_or(RagError::IndexOutOfRange {
                index: ordinal,
                len: self.texts.len(),
                store: "text store",
            })
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.texts
    }
}
