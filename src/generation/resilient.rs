//! Resilient generation client: credential rotation with bounded backoff
//!
//! The rotation cursor is the only shared mutable state in the engine; it
//! sits behind a mutex so concurrently handled requests never race a
//! rotate-and-read.

use crate::config::GenerationConfig;
use crate::generation::{Credential, GenerationBackend, GenerationError, GenerationParams};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct ResilientGenerationClient {
    backend: Arc<dyn GenerationBackend>,
    credentials: Vec<Credential>,
    cursor: Mutex<usize>,
    config: GenerationConfig,
}

impl ResilientGenerationClient {
    /// Create a client over a credential pool; the pool must be non-empty
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        credentials: Vec<Credential>,
        config: GenerationConfig,
    ) -> Result<Self, GenerationError> {
        if credentials.is_empty() {
            return Err(GenerationError::Fatal(
                "Credential pool cannot be empty".to_string(),
            ));
        }
        tracing::info!("Generation client ready with {} credential(s)", credentials.len());
        Ok(Self {
            backend,
            credentials,
            cursor: Mutex::new(0),
            config,
        })
    }

    /// Generate text, rotating credentials and backing off as needed
    ///
    /// Bounded state machine: total attempts never exceed
    /// retries_per_credential x credential count. Transitions: success
    /// returns; rate limit rotates (multi-credential) or sleeps (single);
    /// transient faults sleep; anything else fails immediately.
    pub async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, GenerationError> {
        let max_attempts = self.config.retries_per_credential * self.credentials.len() as u32;
        let mut attempt: u32 = 0;

        let per_call = Duration::from_secs(self.config.request_timeout_secs);

        while attempt < max_attempts {
            let credential = self.current_credential().await;

            // A hung call is indistinguishable from a transient fault.
            let outcome = match tokio::time::timeout(
                per_call,
                self.backend.generate(&credential, prompt, params),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Transient(format!(
                    "no response within {}s",
                    self.config.request_timeout_secs
                ))),
            };

            match outcome {
                Ok(text) => return Ok(text),
                Err(GenerationError::RateLimited(msg)) => {
                    attempt += 1;
                    if self.credentials.len() > 1 {
                        // A fresh credential has its own quota; retry at once.
                        let next = self.rotate().await;
                        tracing::warn!(
                            "Rate limit on '{}': rotating to '{next}' ({msg})",
                            credential.label
                        );
                    } else {
                        tracing::warn!(
                            "Rate limit on sole credential '{}', backing off ({msg})",
                            credential.label
                        );
                        self.backoff(attempt).await;
                    }
                }
                Err(GenerationError::Transient(msg)) => {
                    attempt += 1;
                    tracing::warn!("Transient generation fault, backing off: {msg}");
                    self.backoff(attempt).await;
                }
                Err(err) => {
                    tracing::error!("Non-retryable generation failure: {err}");
                    return Err(err);
                }
            }
        }

        Err(GenerationError::Exhausted {
            attempts: max_attempts,
        })
    }

    async fn current_credential(&self) -> Credential {
        let cursor = self.cursor.lock().await;
        self.credentials[*cursor].clone()
    }

    /// Advance the round-robin cursor; returns the new credential's label
    async fn rotate(&self) -> String {
        let mut cursor = self.cursor.lock().await;
        *cursor = (*cursor + 1) % self.credentials.len();
        self.credentials[*cursor].label.clone()
    }

    /// Exponential backoff with jitter: base x 2^(attempt-1) + rand(0..jitter)
    async fn backoff(&self, attempt: u32) {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.config.backoff_base_secs * f64::powi(2.0, exponent as i32);
        let jitter = if self.config.backoff_jitter_secs > 0.0 {
            rand::thread_rng().gen_range(0.0..self.config.backoff_jitter_secs)
        } else {
            0.0
        };
        tokio::time::sleep(Duration::from_secs_f64(base + jitter)).await;
    }
}
