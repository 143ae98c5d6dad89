//! Exam cache contract and in-memory reference implementation
//!
//! The cache is an external, already-concurrent-safe store; the engine only
//! issues get/set with a TTL. Read failures are treated as misses and write
//! failures are dropped, so implementations report neither.

use ahash::AHashMap;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Namespace prefix for assembled exam entries
pub const EXAM_KEY_PREFIX: &str = "exam:cache:";

/// Key-value cache with TTL semantics
#[async_trait]
pub trait ExamCache: Send + Sync {
    /// Fetch a value; `None` on miss, expiry, or backend failure
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a value with a TTL; backend failures are silently dropped
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

/// In-memory TTL cache backing the tests
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<AHashMap<String, (Vec<u8>, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ExamCache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.write().await;
        let expired = match entries.get(key) {
            Some((_, expires_at)) => Instant::now() >= *expires_at,
            None => return None,
        };
        if expired {
            // Evict on read so the map doesn't accumulate dead bundles.
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(value, _)| value.clone())
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        entries.insert(key.to_string(), (value, now + ttl));
    }
}
