//! Embedding generation
//!
//! Turns text into fixed-length vectors via an external provider, fronted
//! by a bounded in-process cache.
//!
//! The contract fails closed: empty input or a provider failure yields
//! `None` rather than an error. Ingestion stores records without the
//! embedding field; search treats the record as non-matchable.

pub mod cache;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

pub use cache::EmbeddingCache;
pub use openai::OpenAiEmbedder;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for text. `None` means "no embedding":
    /// empty input, missing credential, or provider failure.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Embedding dimension
    fn dimension(&self) -> usize;
}

/// Caching wrapper around any [`Embedder`].
///
/// Keyed by a content hash of the trimmed input, so reworded text misses
/// and identical resubmissions (the common case) hit.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: EmbeddingCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(capacity),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let key = EmbeddingCache::key_for(trimmed);
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit);
        }

        let vector = self.inner.embed(trimmed).await?;
        self.cache.put(key, vector.clone());
        Some(vector)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Embedder used when no provider credential is configured.
///
/// Always returns `None`; the engine runs in a degraded mode where
/// similarity matching simply finds nothing.
pub struct DisabledEmbedder {
    dimension: usize,
}

impl DisabledEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
