//! Configuration for the exam assembly engine
//!
//! Loaded from TOML, overridable from the environment, validated before use.

use crate::error::{ExamError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Hybrid retrieval knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// RRF K constant (typically 60)
    pub rrf_k: f32,
    /// Weight for the dense ranked list in fusion
    pub dense_weight: f32,
    /// Weight for the sparse ranked list in fusion
    pub sparse_weight: f32,
    /// Prefetch depth for the dense similarity query
    pub dense_prefetch: usize,
    /// Prefetch depth for the sparse similarity query
    pub sparse_prefetch: usize,
    /// Drop fused results below this score (0 disables)
    pub min_score: f32,
    /// Per-query timeout in seconds; a timed-out query counts as a failure
    pub query_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            dense_weight: 1.0,
            sparse_weight: 1.0,
            dense_prefetch: 25,
            sparse_prefetch: 25,
            min_score: 0.0,
            query_timeout_secs: 30,
        }
    }
}

/// Assembly policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Fetch this multiple of each quota cell to leave dedup headroom (board)
    pub board_over_fetch_ratio: f64,
    /// Over-fetch ratio for the custom/hybrid path
    pub custom_over_fetch_ratio: f64,
    /// Abort the request when more than this fraction of queries fail
    pub error_budget: f64,
    /// Priority penalty applied per prior usage of a question
    pub usage_penalty: i64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            board_over_fetch_ratio: 2.0,
            custom_over_fetch_ratio: 1.5,
            error_budget: 0.30,
            usage_penalty: 5,
        }
    }
}

/// Generation client retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Retry attempts allotted per credential
    pub retries_per_credential: u32,
    /// Base backoff in seconds; doubles per attempt
    pub backoff_base_secs: f64,
    /// Upper bound for random jitter added to each backoff, in seconds
    pub backoff_jitter_secs: f64,
    /// Sampling temperature for synthesized questions
    pub temperature: f32,
    /// Token budget for synthesized questions
    pub max_tokens: u32,
    /// Per-call timeout in seconds; a timed-out call is retried as transient
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            retries_per_credential: 3,
            backoff_base_secs: 5.0,
            backoff_jitter_secs: 3.0,
            temperature: 0.5,
            max_tokens: 3000,
            request_timeout_secs: 60,
        }
    }
}

/// Exam cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for cached custom exams, in seconds
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 3600 }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ExamError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ExamError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(ttl) = std::env::var("EXAMFORGE_CACHE_TTL") {
            if let Ok(secs) = ttl.parse() {
                self.cache.ttl_seconds = secs;
            }
        }
        if let Ok(retries) = std::env::var("EXAMFORGE_GENERATION_RETRIES") {
            if let Ok(n) = retries.parse() {
                self.generation.retries_per_credential = n;
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            assembly: AssemblyConfig::default(),
            generation: GenerationConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_retrieval(config, &mut errors);
        Self::validate_assembly(config, &mut errors);
        Self::validate_generation(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ExamError::ConfigValidation { errors })
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let r = &config.retrieval;
        if r.rrf_k <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                "RRF K must be positive",
            ));
        }
        if r.dense_weight <= 0.0 || r.sparse_weight <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.dense_weight",
                "Fusion weights must be positive",
            ));
        }
        if r.dense_prefetch == 0 || r.sparse_prefetch == 0 {
            errors.push(ValidationError::new(
                "retrieval.dense_prefetch",
                "Prefetch depths must be greater than 0",
            ));
        }
        if r.query_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "retrieval.query_timeout_secs",
                "Query timeout must be greater than 0",
            ));
        }
    }

    fn validate_assembly(config: &Config, errors: &mut Vec<ValidationError>) {
        let a = &config.assembly;
        if a.board_over_fetch_ratio < 1.0 || a.custom_over_fetch_ratio < 1.0 {
            errors.push(ValidationError::new(
                "assembly.board_over_fetch_ratio",
                "Over-fetch ratios must be at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&a.error_budget) {
            errors.push(ValidationError::new(
                "assembly.error_budget",
                "Error budget must be within [0, 1]",
            ));
        }
    }

    fn validate_generation(config: &Config, errors: &mut Vec<ValidationError>) {
        let g = &config.generation;
        if g.retries_per_credential == 0 {
            errors.push(ValidationError::new(
                "generation.retries_per_credential",
                "At least one retry per credential is required",
            ));
        }
        if g.backoff_base_secs <= 0.0 {
            errors.push(ValidationError::new(
                "generation.backoff_base_secs",
                "Backoff base must be positive",
            ));
        }
        if g.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "generation.request_timeout_secs",
                "Request timeout must be greater than 0",
            ));
        }
    }
}
