use thiserror::Error;

/// Main error type for the exam assembly engine
#[derive(Error, Debug)]
pub enum ExamError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Unknown exam template
    #[error("Template not found: {id}")]
    TemplateNotFound { id: String },

    /// Too many retrieval queries in a batch failed; the store is unstable.
    /// Retryable by the caller.
    #[error("Retrieval instability: {percent}% of queries failed, try again later")]
    ServiceUnavailable { percent: u32 },

    /// Generation retry budget exhausted across all credentials
    #[error("Generation exhausted: all credentials and retries used up")]
    GenerationExhausted,

    /// Vector store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<crate::store::StoreError> for ExamError {
    fn from(err: crate::store::StoreError) -> Self {
        ExamError::Store(err.to_string())
    }
}

impl From<crate::generation::GenerationError> for ExamError {
    fn from(err: crate::generation::GenerationError) -> Self {
        match err {
            crate::generation::GenerationError::Exhausted { .. } => ExamError::GenerationExhausted,
            other => ExamError::Other(anyhow::Error::new(other)),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for exam assembly operations
pub type Result<T> = std::result::Result<T, ExamError>;
