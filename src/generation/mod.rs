//! Text-generation backend seam and failure classification

mod resilient;

pub use resilient::ResilientGenerationClient;

use async_trait::async_trait;
use thiserror::Error;

/// Generation failure classes driving the retry policy
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Rate limit / quota exceeded; rotate credentials or back off
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transient server-side fault; back off and retry
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Non-retryable failure (bad request, safety rejection, auth)
    #[error("Generation failed: {0}")]
    Fatal(String),

    /// All credentials and retry budget used up
    #[error("Generation exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// One API credential in the rotation pool
#[derive(Debug, Clone)]
pub struct Credential {
    /// Display label for logging (never the secret)
    pub label: String,
    pub secret: String,
}

impl Credential {
    pub fn new(label: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            secret: secret.into(),
        }
    }
}

/// Sampling parameters for a generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw generation backend
///
/// Implementations translate provider-specific failures into
/// `GenerationError` classes; `classify_failure` covers the common
/// status-code and message-substring signals.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        credential: &Credential,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, GenerationError>;
}

/// Map a provider status code and message onto a failure class
pub fn classify_failure(status: Option<u16>, message: &str) -> GenerationError {
    let lower = message.to_lowercase();
    let rate_limited = status == Some(429)
        || lower.contains("429")
        || lower.contains("quota")
        || lower.contains("rate limit");
    if rate_limited {
        return GenerationError::RateLimited(message.to_string());
    }
    if status.is_some_and(|s| (500..600).contains(&s)) || lower.contains("unavailable") {
        return GenerationError::Transient(message.to_string());
    }
    GenerationError::Fatal(message.to_string())
}
