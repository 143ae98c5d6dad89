//! Hybrid retrieval: query/candidate types, rank fusion, and the retriever

mod fusion;
mod hybrid;

pub use fusion::{reciprocal_rank_fusion, FusionConfig};
pub use hybrid::{HybridRetriever, SearchError};

use crate::store::{Filter, ScoredPoint};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Search query with typed filters
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Query text
    pub text: String,

    /// Collection to search
    pub collection: String,

    /// Typed filter conditions, translated at the adapter boundary
    pub filter: Filter,

    /// Maximum number of results
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, collection: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            collection: collection.into(),
            filter: Filter::new(),
            limit,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// Metadata carried by a retrievable question or textbook chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionMetadata {
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub taxonomy_level: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub question_type: String,
    #[serde(default)]
    pub marks: u32,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub source_tag: String,
    #[serde(default)]
    pub quality_score: f64,
    #[serde(default)]
    pub usage_count: u64,
}

/// A retrievable unit: store id, text, metadata, and retrieval scores
///
/// Ephemeral per request; identity is the store id, not the struct instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    pub metadata: QuestionMetadata,
    /// Fused retrieval score
    pub score: f32,
    /// Normalized rerank score; mirrors `score` when no reranker runs
    pub rerank_score: f32,
}

impl Candidate {
    /// Build a candidate from a store point, splitting text from metadata
    pub fn from_point(point: ScoredPoint) -> Self {
        let text = point
            .payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let metadata: QuestionMetadata =
            serde_json::from_value(point.payload).unwrap_or_default();
        Self {
            id: point.id,
            text,
            metadata,
            score: point.score,
            rerank_score: point.score,
        }
    }
}
