//! Exam template definitions and the built-in template registry
//!
//! Templates are read-only configuration: an ordered list of sections, an
//! overall taxonomy-level distribution, and chapter metadata. They are loaded
//! once per request and never mutated.

use crate::error::{ExamError, Result};
use serde::{Deserialize, Serialize};

/// One section of an exam paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Section code ("A", "B", ...)
    pub code: String,
    pub name: String,
    /// Number of questions this section must carry
    pub question_count: usize,
    pub marks_per_question: u32,
    /// Required question type ("MCQ", "VSA", "SA", "LA", "CASE_BASED")
    pub question_type: String,
}

/// Exam pattern for one board/grade/subject combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamTemplate {
    pub id: String,
    pub board: String,
    pub grade: u32,
    pub subject: String,
    pub pattern_type: String,
    pub total_marks: u32,
    pub duration_minutes: u32,
    /// Sections in paper order; assignment iterates this order
    pub sections: Vec<Section>,
    /// Taxonomy-level distribution as (level, percent) pairs summing to 100
    pub taxonomy_distribution: Vec<(String, u32)>,
    pub applicable_chapters: Vec<String>,
    /// Optional per-chapter weightage percentages
    #[serde(default)]
    pub chapter_weightage: Vec<(String, u32)>,
}

impl ExamTemplate {
    /// Total question count across all sections
    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(|s| s.question_count).sum()
    }
}

fn standard_taxonomy_distribution() -> Vec<(String, u32)> {
    vec![
        ("Remember".to_string(), 20),
        ("Understand".to_string(), 25),
        ("Apply".to_string(), 30),
        ("Analyze".to_string(), 20),
        ("Evaluate".to_string(), 5),
    ]
}

fn section(
    code: &str,
    name: &str,
    question_count: usize,
    marks_per_question: u32,
    question_type: &str,
) -> Section {
    Section {
        code: code.to_string(),
        name: name.to_string(),
        question_count,
        marks_per_question,
        question_type: question_type.to_string(),
    }
}

/// Official 2025-26 pattern for Class 10 Mathematics
fn cbse_10_maths_board_2025() -> ExamTemplate {
    ExamTemplate {
        id: "CBSE_10_MATHS_BOARD_2025".to_string(),
        board: "CBSE".to_string(),
        grade: 10,
        subject: "Mathematics".to_string(),
        pattern_type: "board_exam".to_string(),
        total_marks: 80,
        duration_minutes: 180,
        sections: vec![
            section("A", "Section A - Objective", 20, 1, "MCQ"),
            section("B", "Section B - Very Short Answer", 5, 2, "VSA"),
            section("C", "Section C - Short Answer", 6, 3, "SA"),
            section("D", "Section D - Long Answer", 4, 5, "LA"),
            section("E", "Section E - Case-Based", 3, 4, "CASE_BASED"),
        ],
        taxonomy_distribution: standard_taxonomy_distribution(),
        applicable_chapters: [
            "Real Numbers",
            "Polynomials",
            "Pair of Linear Equations in Two Variables",
            "Quadratic Equations",
            "Arithmetic Progressions",
            "Triangles",
            "Coordinate Geometry",
            "Introduction to Trigonometry",
            "Some Applications of Trigonometry",
            "Circles",
            "Areas Related to Circles",
            "Surface Areas and Volumes",
            "Statistics",
            "Probability",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        chapter_weightage: vec![
            ("Real Numbers".to_string(), 6),
            ("Polynomials".to_string(), 5),
            ("Pair of Linear Equations in Two Variables".to_string(), 5),
            ("Quadratic Equations".to_string(), 5),
            ("Arithmetic Progressions".to_string(), 5),
            ("Coordinate Geometry".to_string(), 6),
            ("Triangles".to_string(), 8),
            ("Circles".to_string(), 7),
            ("Introduction to Trigonometry".to_string(), 6),
            ("Some Applications of Trigonometry".to_string(), 6),
            ("Areas Related to Circles".to_string(), 5),
            ("Surface Areas and Volumes".to_string(), 5),
            ("Statistics".to_string(), 6),
            ("Probability".to_string(), 5),
        ],
    }
}

fn cbse_10_science_board_2025() -> ExamTemplate {
    ExamTemplate {
        id: "CBSE_10_SCIENCE_BOARD_2025".to_string(),
        board: "CBSE".to_string(),
        grade: 10,
        subject: "Science".to_string(),
        pattern_type: "board_exam".to_string(),
        total_marks: 80,
        duration_minutes: 180,
        sections: vec![
            section("A", "Objective", 20, 1, "MCQ"),
            section("B", "VSA", 6, 2, "VSA"),
            section("C", "SA", 7, 3, "SA"),
            section("D", "LA", 3, 5, "LA"),
            section("E", "Case", 3, 4, "CASE_BASED"),
        ],
        taxonomy_distribution: standard_taxonomy_distribution(),
        applicable_chapters: [
            "Chemical Reactions and Equations",
            "Acids Bases and Salts",
            "Metals and Non-Metals",
            "Life Processes",
            "Light",
            "Electricity",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        chapter_weightage: Vec::new(),
    }
}

/// Look up a built-in template by id
pub fn get_template(template_id: &str) -> Result<ExamTemplate> {
    match template_id {
        "CBSE_10_MATHS_BOARD_2025" => Ok(cbse_10_maths_board_2025()),
        "CBSE_10_SCIENCE_BOARD_2025" => Ok(cbse_10_science_board_2025()),
        _ => Err(ExamError::TemplateNotFound {
            id: template_id.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maths_template_totals() {
        let t = get_template("CBSE_10_MATHS_BOARD_2025").unwrap();
        assert_eq!(t.total_questions(), 38);
        assert_eq!(t.total_marks, 80);
        let marks: u32 = t
            .sections
            .iter()
            .map(|s| s.question_count as u32 * s.marks_per_question)
            .sum();
        assert_eq!(marks, 80);
    }

    #[test]
    fn taxonomy_distribution_sums_to_100() {
        for id in ["CBSE_10_MATHS_BOARD_2025", "CBSE_10_SCIENCE_BOARD_2025"] {
            let t = get_template(id).unwrap();
            let total: u32 = t.taxonomy_distribution.iter().map(|(_, p)| p).sum();
            assert_eq!(total, 100, "{id}");
        }
    }

    #[test]
    fn unknown_template_is_an_error() {
        let err = get_template("ICSE_12_HISTORY").unwrap_err();
        assert!(matches!(err, ExamError::TemplateNotFound { .. }));
    }
}
