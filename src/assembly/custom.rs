//! Custom exam assembler (hybrid mode)
//!
//! Cache-first: a deterministic fingerprint of the normalized request short-
//! circuits repeat requests. On a miss, the quota is spread across the
//! requested chapters and each chapter's shortfall is synthesized through the
//! resilient generation client.

use crate::assembly::{
    allocate_chapters, assign_to_sections, flatten_sections, ExamBundle, GenerationMethod,
};
use crate::cache::{ExamCache, EXAM_KEY_PREFIX};
use crate::config::Config;
use crate::dedup::deduplicate;
use crate::error::Result;
use crate::generation::{GenerationParams, ResilientGenerationClient};
use crate::quality::{QualityScorer, CUSTOM_QUALITY_THRESHOLD};
use crate::retrieval::{Candidate, HybridRetriever, QuestionMetadata, SearchQuery};
use crate::store::Filter;
use crate::template::{get_template, ExamTemplate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source tag applied to synthesized questions
pub const GENERATED_SOURCE_TAG: &str = "GENERATED_FALLBACK";

/// A custom exam request, normalized for fingerprinting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomExamRequest {
    pub template_id: String,
    pub chapters: Vec<String>,
    pub chapter_weightage: Vec<(String, u32)>,
    pub difficulty: String,
}

impl CustomExamRequest {
    /// Deterministic fingerprint of the normalized request
    ///
    /// Chapters are sorted and the weightage map keyed canonically, so two
    /// requests differing only in input order produce the same key.
    pub fn fingerprint(&self) -> String {
        let mut chapters = self.chapters.clone();
        chapters.sort();
        let weightage: BTreeMap<&str, u32> = self
            .chapter_weightage
            .iter()
            .map(|(c, w)| (c.as_str(), *w))
            .collect();

        let normalized = serde_json::json!({
            "template_id": self.template_id,
            "chapters": chapters,
            "chapter_weightage": weightage,
            "difficulty": self.difficulty,
        });
        // serde_json maps serialize with sorted keys, so this is canonical
        blake3::hash(normalized.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}

/// A question synthesized by the generation backend
#[derive(Debug, Clone, Deserialize)]
struct GeneratedQuestion {
    #[serde(default)]
    text: String,
    #[serde(default)]
    question_type: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    taxonomy_level: String,
    #[serde(default)]
    marks: u32,
}

pub struct CustomExamAssembler {
    retriever: Arc<HybridRetriever>,
    generation_client: Arc<ResilientGenerationClient>,
    cache: Arc<dyn ExamCache>,
    scorer: QualityScorer,
    questions_collection: String,
    textbook_collection: String,
    config: Config,
}

impl CustomExamAssembler {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        generation_client: Arc<ResilientGenerationClient>,
        cache: Arc<dyn ExamCache>,
        questions_collection: impl Into<String>,
        textbook_collection: impl Into<String>,
        config: Config,
    ) -> Self {
        Self {
            retriever,
            generation_client,
            cache,
            scorer: QualityScorer::new(),
            questions_collection: questions_collection.into(),
            textbook_collection: textbook_collection.into(),
            config,
        }
    }

    /// Assemble a custom exam, serving from cache when possible
    pub async fn generate(&self, request: &CustomExamRequest) -> Result<ExamBundle> {
        let start = Instant::now();
        let cache_key = format!("{EXAM_KEY_PREFIX}{}", request.fingerprint());

        if let Some(bytes) = self.cache.get(&cache_key).await {
            match serde_json::from_slice::<ExamBundle>(&bytes) {
                Ok(mut bundle) => {
                    bundle.generation_method = GenerationMethod::Cached;
                    bundle.latency_ms = start.elapsed().as_millis() as u64;
                    tracing::info!("Custom exam served from cache");
                    return Ok(bundle);
                }
                Err(e) => {
                    // Corrupt entry: treat as a miss and rebuild.
                    tracing::warn!("Discarding unreadable cache entry: {e}");
                }
            }
        }

        let template = get_template(&request.template_id)?;
        let total_questions = template.total_questions();
        let chapter_dist =
            allocate_chapters(&request.chapters, &request.chapter_weightage, total_questions);

        tracing::info!(
            "Assembling custom exam {}: {total_questions} questions over {} chapters",
            request.template_id,
            request.chapters.len()
        );

        let mut pool: Vec<Candidate> = Vec::new();
        let mut synthesized_any = false;

        for (chapter, count) in chapter_dist {
            if count == 0 {
                continue;
            }

            let mut found = self
                .fetch_chapter(&template, &chapter, count, &request.difficulty)
                .await;
            tracing::info!(
                "Chapter '{chapter}': found {}/{count} in the store",
                found.len()
            );

            if found.len() > count {
                found.truncate(count);
            }
            let missing = count - found.len();
            pool.append(&mut found);

            if missing > 0 {
                tracing::warn!("Chapter '{chapter}': synthesizing {missing} questions");
                // The bundle is marked real-time whenever the fallback runs,
                // even if everything it produced was gated out.
                synthesized_any = true;
                let generated = self
                    .synthesize(&template, &chapter, missing, &request.difficulty)
                    .await;
                pool.extend(generated);
            }
        }

        let unique = deduplicate(pool);
        let sections = assign_to_sections(unique, &template);
        let questions = flatten_sections(&sections, &template);

        let generation_method = if synthesized_any {
            GenerationMethod::RealTime
        } else {
            GenerationMethod::PreGenerated
        };

        let bundle = ExamBundle {
            exam_id: uuid::Uuid::new_v4().to_string(),
            mode: "custom".to_string(),
            template_id: request.template_id.clone(),
            total_questions: questions.len(),
            sections,
            questions,
            total_marks: template.total_marks,
            duration_minutes: template.duration_minutes,
            chapters_covered: request.chapters.clone(),
            generation_method,
            generated_at: chrono::Utc::now(),
            latency_ms: start.elapsed().as_millis() as u64,
        };

        // Write-through; a failed write just means the next request rebuilds.
        match serde_json::to_vec(&bundle) {
            Ok(bytes) => {
                self.cache
                    .set(
                        &cache_key,
                        bytes,
                        Duration::from_secs(self.config.cache.ttl_seconds),
                    )
                    .await;
            }
            Err(e) => tracing::warn!("Failed to serialize bundle for caching: {e}"),
        }

        Ok(bundle)
    }

    /// Retrieve up to `count * over_fetch` questions for one chapter
    ///
    /// Retrieval failures are logged and yield an empty set; the synthesis
    /// fallback then covers the whole cell.
    async fn fetch_chapter(
        &self,
        template: &ExamTemplate,
        chapter: &str,
        count: usize,
        difficulty: &str,
    ) -> Vec<Candidate> {
        let mut filter = Filter::new()
            .eq("board", template.board.as_str())
            .eq("grade", template.grade)
            .eq("subject", template.subject.as_str())
            .eq("chapter", chapter)
            .gte("quality_score", CUSTOM_QUALITY_THRESHOLD);
        if difficulty != "Mixed" {
            filter = filter.eq("difficulty", difficulty);
        }

        let limit =
            ((count as f64) * self.config.assembly.custom_over_fetch_ratio).ceil() as usize;
        let query = SearchQuery::new(
            format!("{chapter} questions"),
            self.questions_collection.clone(),
            limit,
        )
        .with_filter(filter);

        match self.retriever.search(&query).await {
            Ok(mut candidates) => {
                for candidate in &mut candidates {
                    candidate.metadata.chapter = chapter.to_string();
                }
                candidates
            }
            Err(e) => {
                tracing::error!("Chapter '{chapter}' retrieval failed: {e}");
                Vec::new()
            }
        }
    }

    /// Synthesize questions for a chapter's shortfall
    ///
    /// Exhaustion or a fatal backend failure costs only this chapter's
    /// missing questions, never the whole request.
    async fn synthesize(
        &self,
        template: &ExamTemplate,
        chapter: &str,
        count: usize,
        difficulty: &str,
    ) -> Vec<Candidate> {
        let context = self.fetch_textbook_context(template, chapter).await;
        let prompt = build_prompt(template, chapter, count, difficulty, &context);
        let params = GenerationParams {
            temperature: self.config.generation.temperature,
            max_tokens: self.config.generation.max_tokens,
        };

        let raw = match self.generation_client.generate(&prompt, params).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Synthesis failed for chapter '{chapter}': {e}");
                return Vec::new();
            }
        };

        let mut generated = Vec::new();
        for g in parse_generated(&raw) {
            if g.text.trim().is_empty() {
                continue;
            }
            let mut candidate = Candidate {
                id: uuid::Uuid::new_v4().to_string(),
                text: g.text,
                metadata: QuestionMetadata {
                    chapter: chapter.to_string(),
                    taxonomy_level: g.taxonomy_level,
                    difficulty: difficulty.to_string(),
                    question_type: g.question_type,
                    marks: g.marks,
                    options: g.options,
                    answer: g.answer,
                    explanation: g.explanation,
                    source_tag: GENERATED_SOURCE_TAG.to_string(),
                    quality_score: 0.0,
                    usage_count: 0,
                },
                score: 0.0,
                rerank_score: 0.0,
            };

            // Synthesized output is gated by the same composite score as
            // retrieved practice questions.
            let score = self.scorer.score(&candidate);
            if score < CUSTOM_QUALITY_THRESHOLD {
                tracing::warn!(
                    "Dropping low-quality synthesized question for '{chapter}' (score {score:.4})"
                );
                continue;
            }
            candidate.metadata.quality_score = score;
            generated.push(candidate);
        }
        generated
    }

    /// Top textbook chunks grounding the synthesis prompt; soft-fails empty
    async fn fetch_textbook_context(&self, template: &ExamTemplate, chapter: &str) -> Vec<String> {
        let query = SearchQuery::new(
            format!(
                "{} {} {} {chapter}",
                template.board, template.grade, template.subject
            ),
            self.textbook_collection.clone(),
            5,
        );
        match self.retriever.search(&query).await {
            Ok(chunks) => chunks.into_iter().map(|c| c.text).collect(),
            Err(e) => {
                tracing::warn!("Textbook context lookup failed for '{chapter}': {e}");
                Vec::new()
            }
        }
    }
}

fn build_prompt(
    template: &ExamTemplate,
    chapter: &str,
    count: usize,
    difficulty: &str,
    context: &[String],
) -> String {
    format!(
        "Role: {} exam setter.\n\
         Context:\n{}\n\
         Task: Create {count} questions for Class {} {}, Chapter: {chapter}.\n\
         Difficulty: {difficulty}.\n\
         Mix of types: MCQ (1 mark), Short Answer (2-3 marks).\n\n\
         OUTPUT JSON ARRAY:\n\
         [{{\"text\": \"Question?\", \"question_type\": \"MCQ\", \
         \"options\": [\"A\",\"B\",\"C\",\"D\"], \"answer\": \"A\", \
         \"explanation\": \"...\", \"taxonomy_level\": \"Apply\", \"marks\": 1}}]",
        template.board,
        context.join("\n---\n"),
        template.grade,
        template.subject,
    )
}

/// Parse the backend's reply into generated questions
///
/// Tolerant of markdown code fences and of a bare object instead of an
/// array; unparseable items are skipped.
fn parse_generated(raw: &str) -> Vec<GeneratedQuestion> {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }

    let value: Value = match serde_json::from_str(text.trim()) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Generated output was not valid JSON: {e}");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<GeneratedQuestion>(item).ok())
        .collect()
}
