//! Reciprocal Rank Fusion for combining dense and sparse ranked lists

use ahash::AHashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be positive")]
    InvalidWeights,
}

/// Configuration for fusion
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    pub rrf_k: f32,

    /// Weight for dense results
    pub dense_weight: f32,

    /// Weight for sparse results
    pub sparse_weight: f32,
}

impl FusionConfig {
    pub fn new(rrf_k: f32, dense_weight: f32, sparse_weight: f32) -> Result<Self, FusionError> {
        if dense_weight <= 0.0 || sparse_weight <= 0.0 {
            return Err(FusionError::InvalidWeights);
        }

        Ok(Self {
            rrf_k,
            dense_weight,
            sparse_weight,
        })
    }
}

/// Apply Reciprocal Rank Fusion to combine two ranked lists
///
/// RRF formula: score(id) = sum over all rankings of: weight / (k + rank + 1)
///
/// Rewards documents ranked highly by either signal without requiring the
/// score scales (cosine similarity vs term weights) to be comparable.
/// The sparse list may be empty, in which case fusion degrades to the dense
/// ranking alone.
///
/// # Returns
/// Fused results as (id, fused_score) pairs, sorted by score descending,
/// ties broken by id for determinism.
pub fn reciprocal_rank_fusion(
    dense_results: Vec<(String, f32)>,
    sparse_results: Vec<(String, f32)>,
    config: &FusionConfig,
) -> Vec<(String, f32)> {
    let mut scores: AHashMap<String, f32> = AHashMap::new();

    for (rank, (id, _original_score)) in dense_results.into_iter().enumerate() {
        let rrf_score = config.dense_weight / (config.rrf_k + (rank as f32) + 1.0);
        *scores.entry(id).or_insert(0.0) += rrf_score;
    }

    for (rank, (id, _original_score)) in sparse_results.into_iter().enumerate() {
        let rrf_score = config.sparse_weight / (config.rrf_k + (rank as f32) + 1.0);
        *scores.entry(id).or_insert(0.0) += rrf_score;
    }

    let mut results: Vec<(String, f32)> = scores.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    results
}
