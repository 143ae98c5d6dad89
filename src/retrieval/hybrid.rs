//! Hybrid retriever: fused dense+sparse similarity search over a vector store

use crate::config::RetrievalConfig;
use crate::embedding::{EmbeddingProvider, SparseVector};
use crate::retrieval::{reciprocal_rank_fusion, Candidate, FusionConfig, SearchQuery};
use crate::store::{ScoredPoint, VectorStore};
use ahash::AHashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Vector search failed: {0}")]
    VectorSearchError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Fusion failed: {0}")]
    FusionError(String),
}

/// Hybrid retriever combining dense and sparse similarity signals
///
/// Pure read path: no side effects on the store. Failures on the sparse
/// side always degrade rather than abort: a sparse embedding fault, a sparse
/// store-query fault, or a sparse timeout all fall back to dense-only
/// fusion. Only dense-side faults are surfaced (as an empty result for
/// embedding, as an error for store queries) so the assembler can count
/// them against its error budget.
pub struct HybridRetriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedding_provider,
            store,
            config,
        }
    }

    /// Perform hybrid search
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        // Step 1: Embed the query. Both computations are inference-bound, so
        // they run on the blocking pool and never stall query dispatch.
        let (dense_vec, sparse_vec) = self.embed_query(&query.text).await;

        // Dense embedding failure is a soft fail: log and return nothing.
        let Some(dense_vec) = dense_vec else {
            return Ok(Vec::new());
        };

        // Step 2: Dual prefetch under the same filter, each side under its
        // own timeout so a hung store counts as a failed query upstream. The
        // prefetch depth is a floor, not a cap: a request for more candidates
        // than the configured depth widens both prefetches to match.
        let per_query = Duration::from_secs(self.config.query_timeout_secs);
        let dense_fut = timeout(
            per_query,
            self.store.query_dense(
                &query.collection,
                &dense_vec,
                &query.filter,
                self.config.dense_prefetch.max(query.limit),
            ),
        );

        let (dense_points, sparse_points) = match sparse_vec {
            Some(sparse) => {
                let sparse_fut = timeout(
                    per_query,
                    self.store.query_sparse(
                        &query.collection,
                        &sparse,
                        &query.filter,
                        self.config.sparse_prefetch.max(query.limit),
                    ),
                );
                let (d, s) = tokio::join!(dense_fut, sparse_fut);
                let d = d
                    .map_err(|_| SearchError::VectorSearchError("dense query timed out".to_string()))?
                    .map_err(|e| SearchError::VectorSearchError(e.to_string()))?;
                // A sparse-side store fault never fails the search; the
                // dense list alone still produces a usable ranking.
                let s = match s {
                    Ok(Ok(points)) => points,
                    Ok(Err(e)) => {
                        tracing::warn!("Sparse query failed, degrading to dense-only: {e}");
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::warn!("Sparse query timed out, degrading to dense-only");
                        Vec::new()
                    }
                };
                (d, s)
            }
            None => {
                let d = dense_fut
                    .await
                    .map_err(|_| SearchError::VectorSearchError("dense query timed out".to_string()))?
                    .map_err(|e| SearchError::VectorSearchError(e.to_string()))?;
                (d, Vec::new())
            }
        };

        // Step 3: Reciprocal Rank Fusion.
        let fusion_config = FusionConfig::new(
            self.config.rrf_k,
            self.config.dense_weight,
            self.config.sparse_weight,
        )
        .map_err(|e| SearchError::FusionError(e.to_string()))?;

        let mut payloads: AHashMap<String, ScoredPoint> = AHashMap::new();
        let dense_ranked: Vec<(String, f32)> = dense_points
            .into_iter()
            .map(|p| {
                let pair = (p.id.clone(), p.score);
                payloads.entry(p.id.clone()).or_insert(p);
                pair
            })
            .collect();
        let sparse_ranked: Vec<(String, f32)> = sparse_points
            .into_iter()
            .map(|p| {
                let pair = (p.id.clone(), p.score);
                payloads.entry(p.id.clone()).or_insert(p);
                pair
            })
            .collect();

        let fused = reciprocal_rank_fusion(dense_ranked, sparse_ranked, &fusion_config);

        // Step 4: Hydrate candidates with fused scores, threshold, truncate.
        let mut candidates = Vec::with_capacity(query.limit);
        for (id, fused_score) in fused {
            if candidates.len() >= query.limit {
                break;
            }
            if self.config.min_score > 0.0 && fused_score < self.config.min_score {
                continue;
            }
            if let Some(mut point) = payloads.remove(&id) {
                point.score = fused_score;
                candidates.push(Candidate::from_point(point));
            }
        }

        Ok(candidates)
    }

    /// Compute dense and sparse query embeddings on the blocking pool
    ///
    /// Returns `None` for whichever side failed.
    async fn embed_query(&self, text: &str) -> (Option<Vec<f32>>, Option<SparseVector>) {
        let dense_provider = Arc::clone(&self.embedding_provider);
        let dense_text = text.to_string();
        let dense_task =
            tokio::task::spawn_blocking(move || dense_provider.embed_dense(&dense_text));

        let sparse_provider = Arc::clone(&self.embedding_provider);
        let sparse_text = text.to_string();
        let sparse_task =
            tokio::task::spawn_blocking(move || sparse_provider.embed_sparse(&sparse_text));

        let (dense_res, sparse_res) = tokio::join!(dense_task, sparse_task);

        let dense = match dense_res {
            Ok(Ok(v)) => Some(v),
            Ok(Err(e)) => {
                tracing::error!("Dense embedding failed: {e}");
                None
            }
            Err(e) => {
                tracing::error!("Dense embedding task panicked: {e}");
                None
            }
        };

        let sparse = match sparse_res {
            Ok(Ok(v)) => Some(v),
            Ok(Err(e)) => {
                tracing::warn!("Sparse embedding failed, degrading to dense-only: {e}");
                None
            }
            Err(e) => {
                tracing::warn!("Sparse embedding task panicked, degrading to dense-only: {e}");
                None
            }
        };

        (dense, sparse)
    }
}
