//! Composite quality scoring for candidate questions
//!
//! Deterministic, pure function of the candidate's fields. Downstream use is
//! gated by two named thresholds: strict for board exams, looser for custom
//! practice papers.

use crate::retrieval::Candidate;

/// Minimum quality for board (formal) exam questions
pub const BOARD_QUALITY_THRESHOLD: f64 = 0.85;
/// Minimum quality for custom (practice) exam questions
pub const CUSTOM_QUALITY_THRESHOLD: f64 = 0.70;

/// Source tag fragment marking verified past-paper questions
pub const PAST_PAPER_TAG: &str = "PYQ";
/// Source tag fragment marking verified sample-paper questions
pub const SAMPLE_PAPER_TAG: &str = "CBSE_SAMPLE";

/// Composite quality scorer
///
/// Weighted sum: 0.40 retrieval confidence + 0.20 taxonomy alignment +
/// 0.15 style + 0.15 completeness + 0.10 answer validity.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    /// Taxonomy-alignment stub; replace when a real classifier is wired in
    taxonomy_alignment: f64,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self {
            taxonomy_alignment: 1.0,
        }
    }
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the taxonomy-alignment constant
    pub fn with_taxonomy_alignment(mut self, alignment: f64) -> Self {
        self.taxonomy_alignment = alignment.clamp(0.0, 1.0);
        self
    }

    /// Score a candidate in [0, 1], rounded to 4 decimal places
    pub fn score(&self, candidate: &Candidate) -> f64 {
        let retrieval_confidence = self.retrieval_confidence(candidate);
        let style = self.style_score(candidate);
        let completeness = self.completeness(candidate);
        let validity = self.answer_validity(candidate);

        let score = 0.40 * retrieval_confidence
            + 0.20 * self.taxonomy_alignment
            + 0.15 * style
            + 0.15 * completeness
            + 0.10 * validity;

        (score * 10_000.0).round() / 10_000.0
    }

    /// Retrieval/rerank score when present, else a source-tag heuristic
    fn retrieval_confidence(&self, candidate: &Candidate) -> f64 {
        if candidate.rerank_score > 0.0 {
            return f64::from(candidate.rerank_score).clamp(0.0, 1.0);
        }
        let src = &candidate.metadata.source_tag;
        if src.contains(PAST_PAPER_TAG) {
            0.90
        } else if src.contains(SAMPLE_PAPER_TAG) {
            0.85
        } else {
            0.70
        }
    }

    /// Higher for questions drawn from the authoritative exemplar set
    fn style_score(&self, candidate: &Candidate) -> f64 {
        if candidate.metadata.source_tag.contains(PAST_PAPER_TAG) {
            0.9
        } else {
            0.5
        }
    }

    /// Fraction of required fields present
    fn completeness(&self, candidate: &Candidate) -> f64 {
        let meta = &candidate.metadata;
        let mut present = 0usize;
        let mut required = 3usize;

        if !candidate.text.trim().is_empty() {
            present += 1;
        }
        if !meta.taxonomy_level.is_empty() {
            present += 1;
        }
        if meta.marks > 0 {
            present += 1;
        }

        // Case studies carry their answers in sub-parts, so the answer and
        // explanation fields are only required for the other types.
        if meta.question_type != "CASE_BASED" {
            required += 2;
            if !meta.answer.trim().is_empty() {
                present += 1;
            }
            if !meta.explanation.trim().is_empty() {
                present += 1;
            }
        }

        present as f64 / required as f64
    }

    /// MCQ answers must appear within the option set; other types pass
    fn answer_validity(&self, candidate: &Candidate) -> f64 {
        let meta = &candidate.metadata;
        if meta.question_type != "MCQ" {
            return 1.0;
        }
        let answer = meta.answer.trim().to_lowercase();
        if meta.options.is_empty() || answer.is_empty() {
            return 0.0;
        }
        if meta
            .options
            .iter()
            .any(|option| option.to_lowercase().contains(&answer))
        {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::QuestionMetadata;

    fn mcq(answer: &str, options: &[&str]) -> Candidate {
        Candidate {
            id: "q".to_string(),
            text: "Which gas is produced?".to_string(),
            metadata: QuestionMetadata {
                question_type: "MCQ".to_string(),
                taxonomy_level: "Remember".to_string(),
                marks: 1,
                answer: answer.to_string(),
                explanation: "Reaction yields hydrogen.".to_string(),
                options: options.iter().map(|s| s.to_string()).collect(),
                source_tag: "PYQ_2022".to_string(),
                ..Default::default()
            },
            score: 0.0,
            rerank_score: 0.0,
        }
    }

    #[test]
    fn complete_past_paper_mcq_scores_high() {
        let scorer = QualityScorer::new();
        let q = mcq("Hydrogen", &["Hydrogen", "Oxygen", "Nitrogen", "Helium"]);
        let score = scorer.score(&q);
        // 0.4*0.9 + 0.2*1.0 + 0.15*0.9 + 0.15*1.0 + 0.1*1.0 = 0.945
        assert!((score - 0.945).abs() < 1e-9);
    }

    #[test]
    fn answer_outside_options_zeroes_validity() {
        let scorer = QualityScorer::new();
        let valid = mcq("Hydrogen", &["Hydrogen", "Oxygen"]);
        let invalid = mcq("Argon", &["Hydrogen", "Oxygen"]);
        assert!(scorer.score(&valid) - scorer.score(&invalid) > 0.09);
    }

    #[test]
    fn score_is_bounded_and_deterministic() {
        let scorer = QualityScorer::new();
        let mut q = mcq("", &[]);
        q.metadata.source_tag = String::new();
        q.metadata.answer = String::new();
        q.metadata.explanation = String::new();
        q.text = String::new();
        q.metadata.marks = 0;
        q.metadata.taxonomy_level = String::new();

        let score = scorer.score(&q);
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(score, scorer.score(&q));
    }

    #[test]
    fn retrieval_score_takes_precedence_over_source_fallback() {
        let scorer = QualityScorer::new();
        let mut with_score = mcq("Hydrogen", &["Hydrogen", "Oxygen"]);
        with_score.rerank_score = 0.5;
        let without_score = mcq("Hydrogen", &["Hydrogen", "Oxygen"]);

        // Source fallback (0.9 for past papers) outranks the 0.5 live score
        assert!(scorer.score(&without_score) > scorer.score(&with_score));
    }

    #[test]
    fn case_based_questions_skip_answer_requirements() {
        let scorer = QualityScorer::new();
        let mut case = mcq("", &[]);
        case.metadata.question_type = "CASE_BASED".to_string();
        case.metadata.answer = String::new();
        case.metadata.explanation = String::new();

        // text + taxonomy + marks all present, no answer fields required
        let mut expected_complete = case.clone();
        expected_complete.metadata.question_type = "LA".to_string();
        assert!(scorer.score(&case) > scorer.score(&expected_complete));
    }

    #[test]
    fn rounding_is_four_decimal_places() {
        let scorer = QualityScorer::new().with_taxonomy_alignment(0.33333);
        let q = mcq("Hydrogen", &["Hydrogen", "Oxygen"]);
        let score = scorer.score(&q);
        let rescaled = score * 10_000.0;
        assert!((rescaled - rescaled.round()).abs() < 1e-9);
    }
}
