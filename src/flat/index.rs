//! Flat (exact) L2 Index
//!
//! Stores fixed-dimension vectors contiguously in insertion order and answers
//! k-nearest-neighbor queries by scanning every row.
//!
//! # Performance Characteristics
//! - Add: O(N * D) copy
//! - Search: O(N * D) distance + O(N log k) selection
//! - Memory: N * D * 4 bytes
//!
//! Ordinals are assigned `count..count+N` on each add and never change;
//! there is no deletion.

use thiserror::Error;

use super::backend::DistanceBackend;
use super::pqueue::{Neighbor, TopK};

const MAGIC: u32 = 0x464c4154; // "FLAT"
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4 + 8;

/// Flat-index errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlatIndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Ordinal {ordinal} is out of bounds for vector index of size {count}")]
    OutOfRange { ordinal: usize, count: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Exact nearest-neighbor index over `dimension`-wide vectors
///
/// # Example
/// ```
/// use docrag::flat::FlatIndex;
///
/// let mut index = FlatIndex::new(3);
/// index.add(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]).unwrap();
/// let hits = index.search(&[1.0, 0.0, 0.0], 1).unwrap();
/// assert_eq!(hits[0].0, 0);
/// ```
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    // Row-major, `count * dimension` values
    data: Vec<f32>,
    backend: DistanceBackend,
}

impl FlatIndex {
    /// Create an empty index using the default (unrolled) backend
    pub fn new(dimension: usize) -> Self {
        Self::with_backend(dimension, DistanceBackend::default())
    }

    pub fn with_backend(dimension: usize, backend: DistanceBackend) -> Self {
        FlatIndex {
            dimension,
            data: Vec::new(),
            backend,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn backend(&self) -> DistanceBackend {
        self.backend
    }

    /// Switch distance strategy; stored vectors are unaffected
    pub fn set_backend(&mut self, backend: DistanceBackend) {
        self.backend = backend;
    }

    /// Number of stored vectors
    pub fn count(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors. Every row is validated before anything is written, so a
    /// bad row leaves the index unchanged.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), FlatIndexError> {
        if vectors.is_empty() {
            return Ok(());
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(FlatIndexError::DimensionMismatch {
                expected: self.dimension,
                got: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for v in vectors {
            self.data.extend_from_slice(v);
        }

        Ok(())
    }

    /// Up to `k` nearest stored vectors as `(ordinal, squared L2 distance)`,
    /// ascending by distance, ties broken by lower ordinal.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, FlatIndexError> {
        if query.len() != self.dimension {
            return Err(FlatIndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }

        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let distances = self.backend.distances(&self.data, self.dimension, query);

        let mut top = TopK::new(k.min(distances.len()));
        for (ordinal, distance) in distances.into_iter().enumerate() {
            top.push(Neighbor { distance, ordinal });
        }

        Ok(top.into_sorted())
    }

    /// Copy of the vector stored at `ordinal`
    pub fn reconstruct(&self, ordinal: usize) -> Result<Vec<f32>, FlatIndexError> {
        let count = self.count();
        if ordinal >= count {
            return Err(FlatIndexError::OutOfRange { ordinal, count });
        }

        let start = ordinal * self.dimension;
        Ok(self.data[start..start + self.dimension].to_vec())
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);

        // Header
        buffer.extend_from_slice(&MAGIC.to_le_bytes());
        buffer.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buffer.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        buffer.extend_from_slice(&(self.count() as u64).to_le_bytes());

        // Vectors, row-major
        for &val in &self.data {
            buffer.extend_from_slice(&val.to_le_bytes());
        }

        buffer
    }

    /// Decode an index; the backend is a runtime choice and is not persisted.
    pub fn deserialize(bytes: &[u8], backend: DistanceBackend) -> Result<Self, FlatIndexError> {
        if bytes.len() < HEADER_LEN {
            return Err(FlatIndexError::Serialization("File too short".to_string()));
        }

        let magic = read_u32(bytes, 0);
        if magic != MAGIC {
            return Err(FlatIndexError::Serialization("Invalid magic".to_string()));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(FlatIndexError::Serialization(format!(
                "Unsupported format version {}",
                version
            )));
        }

        let dimension = read_u32(bytes, 6) as usize;
        let count = read_u64(bytes, 10);

        let expected_len = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(dimension))
            .and_then(|values| values.checked_mul(4))
            .and_then(|payload| payload.checked_add(HEADER_LEN))
            .ok_or_else(|| FlatIndexError::Serialization("Header overflows".to_string()))?;

        if bytes.len() != expected_len {
            return Err(FlatIndexError::Serialization(format!(
                "Expected {} bytes for {} vectors of dimension {}, found {}",
                expected_len,
                count,
                dimension,
                bytes.len()
            )));
        }

        if dimension == 0 && count > 0 {
            return Err(FlatIndexError::Serialization("Zero dimension with vectors".to_string()));
        }

        let data: Vec<f32> = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(FlatIndex {
            dimension,
            data,
            backend,
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}
