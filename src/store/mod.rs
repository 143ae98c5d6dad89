//! Vector store abstraction
//!
//! The engine issues fused dense+sparse queries, payload reads, and
//! usage-count writes through this trait. The production adapter talks to a
//! remote store; `InMemoryStore` backs the tests.

mod filter;
mod memory;

pub use filter::{Filter, FilterCondition};
pub use memory::InMemoryStore;

use crate::embedding::SparseVector;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Point not found: {0}")]
    PointNotFound(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// A stored point with vectors and payload
#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub payload: Value,
}

/// A query result: point id, payload, and similarity score
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub payload: Value,
    pub score: f32,
}

/// Async vector store contract
///
/// `query` executes a single-signal similarity search; the hybrid retriever
/// runs one dense and one sparse query under the same filter and fuses the
/// ranked lists itself, so adapters stay simple.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Dense similarity search, filtered, top `limit`
    async fn query_dense(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// Sparse similarity search, filtered, top `limit`
    async fn query_sparse(
        &self,
        collection: &str,
        vector: &SparseVector,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// Fetch points by id (payload only)
    async fn retrieve(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// Insert or replace points
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), StoreError>;

    /// Merge partial payload into an existing point
    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> Result<(), StoreError>;
}

/// Read-modify-write usage counter increment, best-effort
///
/// The store guarantees no atomicity beyond its own set_payload; concurrent
/// increments may lose updates, which is acceptable for a rotation heuristic.
pub async fn increment_usage_count(
    store: &dyn VectorStore,
    collection: &str,
    id: &str,
) -> Result<(), StoreError> {
    let points = store.retrieve(collection, std::slice::from_ref(&id.to_string())).await?;
    let point = points
        .first()
        .ok_or_else(|| StoreError::PointNotFound(id.to_string()))?;
    let current = point
        .payload
        .get("usage_count")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    store
        .set_payload(
            collection,
            id,
            serde_json::json!({ "usage_count": current + 1 }),
        )
        .await
}
