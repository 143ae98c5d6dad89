//! Embedding provider trait
//!
//! The engine consumes dense and sparse embeddings; it never owns the models.
//! Backends (API clients, local ONNX runtimes) implement this trait and are
//! injected through the retriever constructor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Dense embedding failed: {0}")]
    Dense(String),

    #[error("Sparse embedding failed: {0}")]
    Sparse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Sparse term-weight vector (parallel indices/values arrays)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Self {
        Self { indices, values }
    }

    /// Dot product against another sparse vector
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut score = 0.0;
        for (i, idx) in self.indices.iter().enumerate() {
            if let Some(j) = other.indices.iter().position(|o| o == idx) {
                score += self.values[i] * other.values[j];
            }
        }
        score
    }
}

/// Trait for embedding providers
///
/// Dense and sparse embeddings are produced independently; a sparse failure
/// must not prevent callers from using the dense side. Implementations may
/// be CPU- or inference-bound, so the retriever runs them on a blocking
/// execution context.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate a dense vector for a single text
    fn embed_dense(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate a sparse term-weight vector for a single text
    fn embed_sparse(&self, text: &str) -> Result<SparseVector, EmbeddingError>;

    /// Get the dense embedding dimension
    fn dimension(&self) -> usize;
}
