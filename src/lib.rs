//! examforge - Exam Paper Assembly Engine
//!
//! Retrieves and ranks candidate questions from a vector store with hybrid
//! dense+sparse search, deduplicates and quality-scores them, and assembles
//! them into fixed exam templates under quota and diversity constraints,
//! falling back to generative synthesis when the store under-supplies a
//! category.

pub mod assembly;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod logging;
pub mod quality;
pub mod retrieval;
pub mod store;
pub mod template;

pub use error::{ExamError, Result};
