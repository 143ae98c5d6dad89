//! End-to-end assembly tests over in-memory collaborators
//!
//! Exercises the full board and custom pipelines: retrieval fan-out, error
//! budget, dedup, priority assignment, usage rotation, generation fallback,
//! and cache-first short-circuiting.

use async_trait::async_trait;
use examforge::assembly::{
    allocate_by_percentage, BoardExamAssembler, CustomExamAssembler, CustomExamRequest,
    GenerationMethod,
};
use examforge::cache::InMemoryCache;
use examforge::config::Config;
use examforge::embedding::{EmbeddingError, EmbeddingProvider, SparseVector};
use examforge::generation::{
    Credential, GenerationBackend, GenerationError, GenerationParams, ResilientGenerationClient,
};
use examforge::retrieval::HybridRetriever;
use examforge::store::{Filter, InMemoryStore, Point, ScoredPoint, StoreError, VectorStore};
use examforge::template::get_template;
use examforge::ExamError;
use serde_json::json;
use std::sync::Arc;

/// Deterministic embedding provider: dense vector from a content hash,
/// sparse terms from word hashes
struct HashProvider;

impl EmbeddingProvider for HashProvider {
    fn embed_dense(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let hash = blake3::hash(text.as_bytes());
        Ok(hash.as_bytes()[..8]
            .iter()
            .map(|b| *b as f32 / 255.0)
            .collect())
    }

    fn embed_sparse(&self, text: &str) -> Result<SparseVector, EmbeddingError> {
        let indices: Vec<u32> = text
            .split_whitespace()
            .map(|w| {
                w.bytes()
                    .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
                    % 4096
            })
            .collect();
        let values = vec![1.0; indices.len()];
        Ok(SparseVector::new(indices, values))
    }

    fn dimension(&self) -> usize {
        8
    }
}

/// Store whose similarity queries always fail; everything else is inert
struct UnstableStore;

#[async_trait]
impl VectorStore for UnstableStore {
    async fn query_dense(
        &self,
        _collection: &str,
        _vector: &[f32],
        _filter: &Filter,
        _limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        Err(StoreError::QueryFailed("connection reset".to_string()))
    }

    async fn query_sparse(
        &self,
        _collection: &str,
        _vector: &SparseVector,
        _filter: &Filter,
        _limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        Err(StoreError::QueryFailed("connection reset".to_string()))
    }

    async fn retrieve(
        &self,
        _collection: &str,
        _ids: &[String],
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        Ok(Vec::new())
    }

    async fn upsert(&self, _collection: &str, _points: Vec<Point>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_payload(
        &self,
        _collection: &str,
        _id: &str,
        _partial: serde_json::Value,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Backend returning a pre-built JSON batch of synthesized questions
struct CannedBackend {
    reply: String,
}

#[async_trait]
impl GenerationBackend for CannedBackend {
    async fn generate(
        &self,
        _credential: &Credential,
        _prompt: &str,
        _params: GenerationParams,
    ) -> Result<String, GenerationError> {
        Ok(self.reply.clone())
    }
}

fn question_point(
    provider: &HashProvider,
    id: &str,
    text: &str,
    payload_extra: serde_json::Value,
) -> Point {
    let mut payload = json!({
        "text": text,
        "board": "CBSE",
        "quality_score": 0.9,
        "source_tag": "PYQ_2020",
        "usage_count": 0,
        "difficulty": "Medium",
        "answer": "A",
        "explanation": "Standard derivation.",
    });
    if let (Some(base), Some(extra)) = (payload.as_object_mut(), payload_extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    Point {
        id: id.to_string(),
        dense: provider.embed_dense(text).unwrap(),
        sparse: Some(provider.embed_sparse(text).unwrap()),
        payload,
    }
}

/// Seed exactly the full per-cell supply for the science board template
async fn seed_board_supply(store: &InMemoryStore, provider: &HashProvider) -> usize {
    let template = get_template("CBSE_10_SCIENCE_BOARD_2025").unwrap();
    let mut seeded = 0usize;
    let mut points = Vec::new();

    for section in &template.sections {
        let split = allocate_by_percentage(&template.taxonomy_distribution, section.question_count);
        for (level, count) in split {
            for _ in 0..count {
                seeded += 1;
                let text = format!(
                    "Explain concept number {seeded} for {} practice",
                    section.question_type
                );
                points.push(question_point(
                    provider,
                    &format!("q-{seeded:03}"),
                    &text,
                    json!({
                        "grade": 10,
                        "subject": "Science",
                        "question_type": section.question_type,
                        "taxonomy_level": level,
                        "marks": section.marks_per_question,
                        "chapter": "Light",
                    }),
                ));
            }
        }
    }

    store.upsert("questions", points).await.unwrap();
    seeded
}

fn retriever(store: Arc<dyn VectorStore>) -> Arc<HybridRetriever> {
    Arc::new(HybridRetriever::new(
        Arc::new(HashProvider),
        store,
        Config::default().retrieval,
    ))
}

#[tokio::test]
async fn board_exam_fills_every_section_with_full_supply() {
    let store = Arc::new(InMemoryStore::new());
    let seeded = seed_board_supply(&store, &HashProvider).await;

    let template = get_template("CBSE_10_SCIENCE_BOARD_2025").unwrap();
    assert_eq!(seeded, template.total_questions());

    let assembler = BoardExamAssembler::new(
        retriever(store.clone()),
        store.clone(),
        "questions",
        Config::default().assembly,
    );

    let bundle = assembler.generate("CBSE_10_SCIENCE_BOARD_2025").await.unwrap();

    assert_eq!(bundle.total_questions, template.total_questions());
    assert_eq!(bundle.generation_method, GenerationMethod::PreGenerated);
    assert_eq!(bundle.total_marks, 80);

    for section in &template.sections {
        let assigned = &bundle.sections[&section.code];
        assert_eq!(assigned.len(), section.question_count, "section {}", section.code);
        assert!(assigned.iter().all(|q| q.question_type == section.question_type));
        assert!(assigned.iter().all(|q| q.marks == section.marks_per_question));
    }
}

#[tokio::test]
async fn board_exam_increments_usage_counts_for_assigned_questions() {
    let store = Arc::new(InMemoryStore::new());
    seed_board_supply(&store, &HashProvider).await;

    let assembler = BoardExamAssembler::new(
        retriever(store.clone()),
        store.clone(),
        "questions",
        Config::default().assembly,
    );

    let bundle = assembler.generate("CBSE_10_SCIENCE_BOARD_2025").await.unwrap();

    let ids: Vec<String> = bundle.questions.iter().map(|q| q.id.clone()).collect();
    let points = store.retrieve("questions", &ids).await.unwrap();
    assert_eq!(points.len(), ids.len());
    for point in points {
        assert_eq!(point.payload["usage_count"], 1, "question {}", point.id);
    }
}

#[tokio::test]
async fn unstable_store_aborts_with_service_unavailable() {
    let store = Arc::new(UnstableStore);
    let assembler = BoardExamAssembler::new(
        retriever(store.clone()),
        store,
        "questions",
        Config::default().assembly,
    );

    let err = assembler
        .generate("CBSE_10_SCIENCE_BOARD_2025")
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::ServiceUnavailable { .. }));
}

#[tokio::test]
async fn board_shortfall_returns_smaller_bundle_not_an_error() {
    let store = Arc::new(InMemoryStore::new());
    // Only three questions in the whole store
    let points = (0..3)
        .map(|i| {
            question_point(
                &HashProvider,
                &format!("sparse-{i}"),
                &format!("Lonely question number {i} on reflection"),
                json!({
                    "grade": 10,
                    "subject": "Science",
                    "question_type": "MCQ",
                    "taxonomy_level": "Remember",
                    "marks": 1,
                    "chapter": "Light",
                }),
            )
        })
        .collect();
    store.upsert("questions", points).await.unwrap();

    let assembler = BoardExamAssembler::new(
        retriever(store.clone()),
        store,
        "questions",
        Config::default().assembly,
    );

    let bundle = assembler.generate("CBSE_10_SCIENCE_BOARD_2025").await.unwrap();
    let template = get_template("CBSE_10_SCIENCE_BOARD_2025").unwrap();
    assert!(bundle.total_questions < template.total_questions());
    assert_eq!(bundle.total_questions, 3);
}

fn canned_generation_reply() -> String {
    // 5 VSA + 6 SA + 4 LA, matching the maths template's non-MCQ quotas
    let mut items = Vec::new();
    let mut counter = 100;
    for (question_type, marks, count) in [("VSA", 2, 5), ("SA", 3, 6), ("LA", 5, 4)] {
        for _ in 0..count {
            counter += 1;
            items.push(json!({
                "text": format!("Synthesized probability question number {counter}"),
                "question_type": question_type,
                "options": [],
                "answer": format!("Answer {counter}"),
                "explanation": "Derived from the sample space.",
                "taxonomy_level": "Apply",
                "marks": marks,
            }));
        }
    }
    serde_json::Value::Array(items).to_string()
}

fn custom_request(chapters: &[&str]) -> CustomExamRequest {
    CustomExamRequest {
        template_id: "CBSE_10_MATHS_BOARD_2025".to_string(),
        chapters: chapters.iter().map(|s| s.to_string()).collect(),
        chapter_weightage: vec![
            ("Circles".to_string(), 60),
            ("Probability".to_string(), 40),
        ],
        difficulty: "Mixed".to_string(),
    }
}

async fn custom_assembler(
    store: Arc<InMemoryStore>,
    cache: Arc<InMemoryCache>,
    reply: String,
) -> CustomExamAssembler {
    // 23 questions for Circles (the chapter allocation for 38 total at 60%),
    // nothing for Probability: its whole cell goes through synthesis.
    let points = (0..23)
        .map(|i| {
            question_point(
                &HashProvider,
                &format!("circle-{i:02}"),
                &format!("Tangent construction exercise number {i}"),
                json!({
                    "grade": 10,
                    "subject": "Mathematics",
                    "question_type": "MCQ",
                    "taxonomy_level": "Apply",
                    "marks": 1,
                    "chapter": "Circles",
                }),
            )
        })
        .collect();
    store.upsert("questions", points).await.unwrap();
    store.upsert("textbook", Vec::new()).await.unwrap();

    let backend = Arc::new(CannedBackend { reply });
    let client = Arc::new(
        ResilientGenerationClient::new(
            backend,
            vec![Credential::new("key-0", "secret")],
            Config::default().generation,
        )
        .unwrap(),
    );

    CustomExamAssembler::new(
        retriever(store.clone()),
        client,
        cache,
        "questions",
        "textbook",
        Config::default(),
    )
}

#[tokio::test]
async fn custom_exam_synthesizes_shortfall_and_marks_real_time() {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let assembler = custom_assembler(store, cache, canned_generation_reply()).await;

    let bundle = assembler
        .generate(&custom_request(&["Circles", "Probability"]))
        .await
        .unwrap();

    let template = get_template("CBSE_10_MATHS_BOARD_2025").unwrap();
    assert_eq!(bundle.total_questions, template.total_questions());
    assert_eq!(bundle.generation_method, GenerationMethod::RealTime);
    assert_eq!(
        bundle.chapters_covered,
        vec!["Circles".to_string(), "Probability".to_string()]
    );

    // Synthesized items are tagged distinctly from retrieved ones
    let synthesized = bundle
        .questions
        .iter()
        .filter(|q| q.source_tag == "GENERATED_FALLBACK")
        .count();
    assert_eq!(synthesized, 15);
}

#[tokio::test]
async fn fully_gated_synthesis_still_marks_real_time() {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());

    // Every synthesized item comes back stripped of taxonomy, marks,
    // answer, and explanation; the quality gate drops all of them. The
    // bundle must still be flagged real-time: the fallback ran.
    let skeletal: Vec<serde_json::Value> = (0..15)
        .map(|i| {
            json!({
                "text": format!("Incomplete probability sketch number {}", 500 + i),
                "question_type": "SA",
            })
        })
        .collect();
    let assembler = custom_assembler(
        store,
        cache,
        serde_json::Value::Array(skeletal).to_string(),
    )
    .await;

    let bundle = assembler
        .generate(&custom_request(&["Circles", "Probability"]))
        .await
        .unwrap();

    assert_eq!(bundle.generation_method, GenerationMethod::RealTime);
    assert!(bundle
        .questions
        .iter()
        .all(|q| q.source_tag != "GENERATED_FALLBACK"));
    // Only the 23 retrieved Circles questions survive
    assert_eq!(bundle.total_questions, 23);
}

#[tokio::test]
async fn custom_exam_second_call_hits_the_cache() {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let assembler = custom_assembler(store, cache, canned_generation_reply()).await;

    let first = assembler
        .generate(&custom_request(&["Circles", "Probability"]))
        .await
        .unwrap();
    // Chapter order differs; the normalized fingerprint must not.
    let second = assembler
        .generate(&custom_request(&["Probability", "Circles"]))
        .await
        .unwrap();

    assert_eq!(second.generation_method, GenerationMethod::Cached);
    assert_eq!(second.exam_id, first.exam_id);
    assert_eq!(second.total_questions, first.total_questions);
}

#[tokio::test]
async fn custom_exam_without_shortfall_is_pre_generated() {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());

    // Full supply for a single chapter carrying all the weight
    let points = (0..38)
        .map(|i| {
            question_point(
                &HashProvider,
                &format!("circle-{i:02}"),
                &format!("Chord angle exercise number {i}"),
                json!({
                    "grade": 10,
                    "subject": "Mathematics",
                    "question_type": "MCQ",
                    "taxonomy_level": "Apply",
                    "marks": 1,
                    "chapter": "Circles",
                }),
            )
        })
        .collect();
    store.upsert("questions", points).await.unwrap();

    let backend = Arc::new(CannedBackend {
        reply: "[]".to_string(),
    });
    let client = Arc::new(
        ResilientGenerationClient::new(
            backend,
            vec![Credential::new("key-0", "secret")],
            Config::default().generation,
        )
        .unwrap(),
    );
    let assembler = CustomExamAssembler::new(
        retriever(store.clone()),
        client,
        cache,
        "questions",
        "textbook",
        Config::default(),
    );

    let request = CustomExamRequest {
        template_id: "CBSE_10_MATHS_BOARD_2025".to_string(),
        chapters: vec!["Circles".to_string()],
        chapter_weightage: vec![("Circles".to_string(), 100)],
        difficulty: "Mixed".to_string(),
    };
    let bundle = assembler.generate(&request).await.unwrap();
    assert_eq!(bundle.generation_method, GenerationMethod::PreGenerated);
    assert_eq!(bundle.total_questions, 38);
}
