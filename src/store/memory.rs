//! In-memory vector store
//!
//! Reference adapter used by the integration tests: cosine similarity for
//! dense queries, dot product for sparse queries, filters evaluated directly
//! against JSON payloads.

use crate::embedding::SparseVector;
use crate::store::{Filter, Point, ScoredPoint, StoreError, VectorStore};
use ahash::AHashMap;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<AHashMap<String, Vec<Point>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rank(mut scored: Vec<ScoredPoint>, limit: usize) -> Vec<ScoredPoint> {
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn query_dense(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let collections = self.collections.read().await;
        let points = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let scored = points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                payload: p.payload.clone(),
                score: cosine_similarity(&p.dense, vector),
            })
            .collect();

        Ok(Self::rank(scored, limit))
    }

    async fn query_sparse(
        &self,
        collection: &str,
        vector: &SparseVector,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let collections = self.collections.read().await;
        let points = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let scored = points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .filter_map(|p| {
                let sparse = p.sparse.as_ref()?;
                let score = sparse.dot(vector);
                (score > 0.0).then(|| ScoredPoint {
                    id: p.id.clone(),
                    payload: p.payload.clone(),
                    score,
                })
            })
            .collect();

        Ok(Self::rank(scored, limit))
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let collections = self.collections.read().await;
        let points = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        Ok(points
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                payload: p.payload.clone(),
                score: 0.0,
            })
            .collect())
    }

    async fn upsert(&self, collection: &str, new_points: Vec<Point>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let points = collections.entry(collection.to_string()).or_default();
        for point in new_points {
            if let Some(existing) = points.iter_mut().find(|p| p.id == point.id) {
                *existing = point;
            } else {
                points.push(point);
            }
        }
        Ok(())
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let points = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let point = points
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::PointNotFound(id.to_string()))?;

        match (&mut point.payload, partial) {
            (Value::Object(existing), Value::Object(updates)) => {
                for (k, v) in updates {
                    existing.insert(k, v);
                }
            }
            (payload, replacement) => *payload = replacement,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::increment_usage_count;
    use serde_json::json;

    fn point(id: &str, dense: Vec<f32>, payload: Value) -> Point {
        Point {
            id: id.to_string(),
            dense,
            sparse: None,
            payload,
        }
    }

    #[tokio::test]
    async fn dense_query_ranks_by_cosine() {
        let store = InMemoryStore::new();
        store
            .upsert(
                "questions",
                vec![
                    point("a", vec![1.0, 0.0], json!({"subject": "Science"})),
                    point("b", vec![0.0, 1.0], json!({"subject": "Science"})),
                    point("c", vec![0.7, 0.7], json!({"subject": "Science"})),
                ],
            )
            .await
            .unwrap();

        let results = store
            .query_dense("questions", &[1.0, 0.0], &Filter::new(), 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "c");
    }

    #[tokio::test]
    async fn filter_is_applied_before_ranking() {
        let store = InMemoryStore::new();
        store
            .upsert(
                "questions",
                vec![
                    point("a", vec![1.0, 0.0], json!({"subject": "Science"})),
                    point("b", vec![1.0, 0.0], json!({"subject": "Mathematics"})),
                ],
            )
            .await
            .unwrap();

        let filter = Filter::new().eq("subject", "Mathematics");
        let results = store
            .query_dense("questions", &[1.0, 0.0], &filter, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn usage_count_increments_monotonically() {
        let store = InMemoryStore::new();
        store
            .upsert(
                "questions",
                vec![point("q1", vec![1.0], json!({"usage_count": 2}))],
            )
            .await
            .unwrap();

        increment_usage_count(&store, "questions", "q1").await.unwrap();
        increment_usage_count(&store, "questions", "q1").await.unwrap();

        let points = store.retrieve("questions", &["q1".to_string()]).await.unwrap();
        assert_eq!(points[0].payload["usage_count"], 4);
    }

    #[tokio::test]
    async fn missing_collection_is_an_error() {
        let store = InMemoryStore::new();
        let err = store
            .query_dense("nope", &[1.0], &Filter::new(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }
}
