//! Exam assembly: output bundle types and the allocation/assignment helpers
//! shared by the board and custom assemblers

mod board;
mod custom;

pub use board::BoardExamAssembler;
pub use custom::{CustomExamAssembler, CustomExamRequest};

use crate::retrieval::Candidate;
use crate::template::ExamTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the bundle was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationMethod {
    #[serde(rename = "pre-generated")]
    PreGenerated,
    #[serde(rename = "cached")]
    Cached,
    #[serde(rename = "real-time")]
    RealTime,
}

/// A question placed into a section, with type and section forced for
/// consistency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledQuestion {
    pub id: String,
    pub text: String,
    pub question_type: String,
    pub section: String,
    pub marks: u32,
    pub taxonomy_level: String,
    pub difficulty: String,
    pub chapter: String,
    pub options: Vec<String>,
    pub answer: String,
    pub explanation: String,
    pub source_tag: String,
    pub quality_score: f64,
}

impl AssembledQuestion {
    fn from_candidate(candidate: Candidate, section_code: &str, question_type: &str, marks: u32) -> Self {
        let meta = candidate.metadata;
        Self {
            id: candidate.id,
            text: candidate.text,
            question_type: question_type.to_string(),
            section: section_code.to_string(),
            marks,
            taxonomy_level: if meta.taxonomy_level.is_empty() {
                "Understand".to_string()
            } else {
                meta.taxonomy_level
            },
            difficulty: if meta.difficulty.is_empty() {
                "Medium".to_string()
            } else {
                meta.difficulty
            },
            chapter: if meta.chapter.is_empty() {
                "Unknown".to_string()
            } else {
                meta.chapter
            },
            options: meta.options,
            answer: meta.answer,
            explanation: meta.explanation,
            source_tag: meta.source_tag,
            quality_score: meta.quality_score,
        }
    }
}

/// The assembled exam, immutable once returned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamBundle {
    pub exam_id: String,
    pub mode: String,
    pub template_id: String,
    /// Section code -> assigned questions, in section order
    pub sections: BTreeMap<String, Vec<AssembledQuestion>>,
    /// All assigned questions in section order
    pub questions: Vec<AssembledQuestion>,
    pub total_marks: u32,
    pub total_questions: usize,
    pub duration_minutes: u32,
    pub chapters_covered: Vec<String>,
    pub generation_method: GenerationMethod,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub latency_ms: u64,
}

/// Split `count` across the taxonomy distribution with no rounding loss
///
/// Largest-remainder method: every level gets the floor of its proportional
/// share, then the leftover units go one each to the levels with the largest
/// fractional remainders (ties to the higher percentage, then declared
/// order). The returned counts always sum exactly to `count` and are never
/// negative.
pub fn allocate_by_percentage(
    distribution: &[(String, u32)],
    count: usize,
) -> Vec<(String, usize)> {
    if distribution.is_empty() || count == 0 {
        return distribution
            .iter()
            .map(|(level, _)| (level.clone(), 0))
            .collect();
    }

    let mut allocated: Vec<(String, usize)> = Vec::with_capacity(distribution.len());
    // (fractional remainder, percentage, declared index)
    let mut remainders: Vec<(f64, u32, usize)> = Vec::with_capacity(distribution.len());
    let mut assigned = 0usize;

    for (i, (level, pct)) in distribution.iter().enumerate() {
        let share = (*pct as f64 / 100.0) * count as f64;
        let base = share.floor() as usize;
        allocated.push((level.clone(), base));
        remainders.push((share - base as f64, *pct, i));
        assigned += base;
    }

    let mut leftover = count.saturating_sub(assigned);
    remainders.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.cmp(&a.1))
            .then(a.2.cmp(&b.2))
    });

    for (_, _, idx) in remainders {
        if leftover == 0 {
            break;
        }
        allocated[idx].1 += 1;
        leftover -= 1;
    }

    allocated
}

/// Split `total` across chapters by weightage; the first chapter absorbs the
/// rounding remainder
pub fn allocate_chapters(
    chapters: &[String],
    weightage: &[(String, u32)],
    total: usize,
) -> Vec<(String, usize)> {
    if chapters.is_empty() {
        return Vec::new();
    }

    let weight_of = |chapter: &str| -> u32 {
        weightage
            .iter()
            .find(|(c, _)| c == chapter)
            .map(|(_, w)| *w)
            .unwrap_or(0)
    };

    let mut dist: Vec<(String, usize)> = chapters
        .iter()
        .map(|ch| {
            let n = ((weight_of(ch) as f64 / 100.0) * total as f64) as usize;
            (ch.clone(), n)
        })
        .collect();

    let assigned: usize = dist.iter().map(|(_, n)| n).sum();
    if assigned < total {
        dist[0].1 += total - assigned;
    }

    dist
}

/// True when the failed fraction strictly exceeds the budget
///
/// Exactly at the budget passes: 3 failures out of 10 with a 0.30 budget is
/// tolerated, 4 is not.
pub fn exceeds_error_budget(failed: usize, total: usize, budget: f64) -> bool {
    if total == 0 {
        return false;
    }
    (failed as f64 / total as f64) > budget
}

/// Provenance-and-rotation priority: verified archive material first, rarely
/// served material first
pub fn priority_score(candidate: &Candidate, usage_penalty: i64) -> i64 {
    let src = &candidate.metadata.source_tag;
    let source_bonus = if src.contains(crate::quality::PAST_PAPER_TAG) {
        100
    } else if src.contains(crate::quality::SAMPLE_PAPER_TAG) {
        50
    } else {
        10
    };
    source_bonus - usage_penalty * candidate.metadata.usage_count as i64
}

/// Sort candidates by priority descending, ties broken by id for determinism
pub fn sort_by_priority(candidates: &mut [Candidate], usage_penalty: i64) {
    candidates.sort_by(|a, b| {
        priority_score(b, usage_penalty)
            .cmp(&priority_score(a, usage_penalty))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Assign candidates to sections by question type, borrowing across buckets
/// when a type is under-supplied
///
/// Bucket iteration during borrowing is deterministic: the template's
/// declared section-type order first, then any remaining types
/// lexicographically. Borrowed questions are relabeled to the section's
/// required type. Under-fill is logged, never fatal.
pub fn assign_to_sections(
    candidates: Vec<Candidate>,
    template: &ExamTemplate,
) -> BTreeMap<String, Vec<AssembledQuestion>> {
    use std::collections::VecDeque;

    let mut buckets: ahash::AHashMap<String, VecDeque<Candidate>> = ahash::AHashMap::new();
    for candidate in candidates {
        let declared_type = if candidate.metadata.question_type.is_empty() {
            "MCQ".to_string()
        } else {
            candidate.metadata.question_type.clone()
        };
        buckets.entry(declared_type).or_default().push_back(candidate);
    }

    // Deterministic borrowing order: declared section types, then the rest.
    let mut bucket_order: Vec<String> = Vec::new();
    for section in &template.sections {
        if !bucket_order.contains(&section.question_type) {
            bucket_order.push(section.question_type.clone());
        }
    }
    let mut extra_types: Vec<String> = buckets
        .keys()
        .filter(|t| !bucket_order.contains(t))
        .cloned()
        .collect();
    extra_types.sort();
    bucket_order.extend(extra_types);

    let mut assigned: BTreeMap<String, Vec<AssembledQuestion>> = BTreeMap::new();

    for section in &template.sections {
        let mut taken: Vec<Candidate> = Vec::with_capacity(section.question_count);

        if let Some(bucket) = buckets.get_mut(&section.question_type) {
            while taken.len() < section.question_count {
                match bucket.pop_front() {
                    Some(c) => taken.push(c),
                    None => break,
                }
            }
        }

        if taken.len() < section.question_count {
            let needed = section.question_count - taken.len();
            tracing::warn!(
                "Section {} ({}): missing {needed} questions, borrowing from other buckets",
                section.code,
                section.question_type
            );
            for bucket_type in &bucket_order {
                if taken.len() >= section.question_count {
                    break;
                }
                let Some(bucket) = buckets.get_mut(bucket_type) else {
                    continue;
                };
                while taken.len() < section.question_count {
                    match bucket.pop_front() {
                        Some(c) => taken.push(c),
                        None => break,
                    }
                }
            }
        }

        if taken.len() < section.question_count {
            tracing::warn!(
                "Section {} under-filled: {}/{} questions",
                section.code,
                taken.len(),
                section.question_count
            );
        }

        let questions: Vec<AssembledQuestion> = taken
            .into_iter()
            .map(|c| {
                AssembledQuestion::from_candidate(
                    c,
                    &section.code,
                    &section.question_type,
                    section.marks_per_question,
                )
            })
            .collect();
        assigned.insert(section.code.clone(), questions);
    }

    assigned
}

/// Flatten section assignments in template section order
pub fn flatten_sections(
    sections: &BTreeMap<String, Vec<AssembledQuestion>>,
    template: &ExamTemplate,
) -> Vec<AssembledQuestion> {
    template
        .sections
        .iter()
        .filter_map(|s| sections.get(&s.code))
        .flat_map(|qs| qs.iter().cloned())
        .collect()
}
