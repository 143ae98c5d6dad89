//! Board exam assembler (strict mode)
//!
//! Store-only, no generation fallback, high quality threshold, fail-fast
//! when the store looks unstable. Pipeline: load template, build one query
//! per (section, taxonomy level) quota cell, fetch in parallel, enforce the
//! error budget, dedup globally, sort by priority, assign to sections, then
//! fire best-effort usage updates.

use crate::assembly::{
    allocate_by_percentage, assign_to_sections, flatten_sections, sort_by_priority, ExamBundle,
    GenerationMethod,
};
use crate::config::AssemblyConfig;
use crate::dedup::deduplicate;
use crate::error::{ExamError, Result};
use crate::quality::BOARD_QUALITY_THRESHOLD;
use crate::retrieval::{Candidate, HybridRetriever, SearchQuery};
use crate::store::{increment_usage_count, Filter, VectorStore};
use crate::template::get_template;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;

pub struct BoardExamAssembler {
    retriever: Arc<HybridRetriever>,
    store: Arc<dyn VectorStore>,
    questions_collection: String,
    config: AssemblyConfig,
}

impl BoardExamAssembler {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        store: Arc<dyn VectorStore>,
        questions_collection: impl Into<String>,
        config: AssemblyConfig,
    ) -> Self {
        Self {
            retriever,
            store,
            questions_collection: questions_collection.into(),
            config,
        }
    }

    /// Assemble a board exam for a template
    pub async fn generate(&self, template_id: &str) -> Result<ExamBundle> {
        let start = Instant::now();
        let template = get_template(template_id)?;
        let total_questions = template.total_questions();

        tracing::info!(
            "Assembling board exam {template_id}: {total_questions} questions across {} sections",
            template.sections.len()
        );

        // One retrieval query per (section, non-zero taxonomy level) cell,
        // over-fetched to leave dedup headroom.
        let mut queries: Vec<SearchQuery> = Vec::new();
        let mut cell_labels: Vec<String> = Vec::new();

        for section in &template.sections {
            let taxonomy_split =
                allocate_by_percentage(&template.taxonomy_distribution, section.question_count);

            for (level, count) in taxonomy_split {
                if count == 0 {
                    continue;
                }
                let fetch_limit =
                    ((count as f64) * self.config.board_over_fetch_ratio).ceil() as usize;

                let filter = Filter::new()
                    .eq("board", template.board.as_str())
                    .eq("grade", template.grade)
                    .eq("subject", template.subject.as_str())
                    .eq("question_type", section.question_type.as_str())
                    .eq("taxonomy_level", level.as_str())
                    .gte("quality_score", BOARD_QUALITY_THRESHOLD);

                let query_text = format!(
                    "{} {} {} {} {} questions",
                    template.board, template.grade, template.subject, section.question_type, level
                );

                queries.push(
                    SearchQuery::new(query_text, self.questions_collection.clone(), fetch_limit)
                        .with_filter(filter),
                );
                cell_labels.push(format!("{level} ({})", section.code));
            }
        }

        // Parallel fetch: individual failures are captured, never aborting
        // the batch on their own.
        tracing::info!("Dispatching {} parallel retrieval queries", queries.len());
        let results = join_all(queries.iter().map(|q| self.retriever.search(q))).await;

        let mut failed_count = 0usize;
        let mut pool: Vec<Candidate> = Vec::new();
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(candidates) => {
                    if candidates.is_empty() {
                        tracing::warn!("No results for quota cell {}", cell_labels[i]);
                    }
                    pool.extend(candidates);
                }
                Err(e) => {
                    failed_count += 1;
                    tracing::error!("Query failed for quota cell {}: {e}", cell_labels[i]);
                }
            }
        }

        // Fail fast when the store is unstable: a partial board exam built
        // on unreliable results must never be returned silently.
        if crate::assembly::exceeds_error_budget(failed_count, queries.len(), self.config.error_budget)
        {
            let percent =
                ((failed_count as f64 / queries.len() as f64) * 100.0).round() as u32;
            tracing::error!(
                "Error budget exceeded: {failed_count}/{} queries failed",
                queries.len()
            );
            return Err(ExamError::ServiceUnavailable { percent });
        }

        tracing::info!(
            "Fetched {} candidates ({failed_count}/{} queries failed)",
            pool.len(),
            queries.len()
        );

        let mut unique = deduplicate(pool);
        if unique.len() < total_questions {
            tracing::warn!(
                "Insufficient unique questions: {}/{total_questions}; exam may be incomplete",
                unique.len()
            );
        }

        sort_by_priority(&mut unique, self.config.usage_penalty);
        let sections = assign_to_sections(unique, &template);
        let questions = flatten_sections(&sections, &template);

        // Usage rotation: dispatch all increments, await them, ignore
        // individual failures.
        let used_ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        if !used_ids.is_empty() {
            let updates = join_all(used_ids.iter().map(|id| {
                increment_usage_count(self.store.as_ref(), &self.questions_collection, id)
            }))
            .await;
            for (id, update) in used_ids.iter().zip(updates) {
                if let Err(e) = update {
                    tracing::warn!("Usage update failed for {id}: {e}");
                }
            }
            tracing::info!("Updated usage counts for {} questions", used_ids.len());
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Board exam assembled in {latency_ms}ms: {}/{total_questions} questions",
            questions.len()
        );

        Ok(ExamBundle {
            exam_id: uuid::Uuid::new_v4().to_string(),
            mode: "board".to_string(),
            template_id: template.id.clone(),
            total_questions: questions.len(),
            sections,
            questions,
            total_marks: template.total_marks,
            duration_minutes: template.duration_minutes,
            chapters_covered: template.applicable_chapters.clone(),
            generation_method: GenerationMethod::PreGenerated,
            generated_at: chrono::Utc::now(),
            latency_ms,
        })
    }
}
