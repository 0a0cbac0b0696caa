//! Bounded key→vector cache
//!
//! Eviction on overflow removes the oldest half of entries by insertion
//! order. That is approximate recency, not LRU — acceptable because the
//! workload is dominated by repeated identical text, not a hot small
//! working set.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

struct CacheInner {
    map: HashMap<String, Vec<f32>>,
    insertion_order: VecDeque<String>,
}

/// Process-wide embedding cache, safe under concurrent access.
///
/// Explicit injectable component rather than a module-level global, so it
/// can be swapped out or sized down in tests.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Content-hash key for a trimmed input text.
    pub fn key_for(trimmed_text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(trimmed_text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.inner.lock().map.get(key).cloned()
    }

    pub fn put(&self, key: String, vector: Vec<f32>) {
        let mut inner = self.inner.lock();
        if inner.map.contains_key(&key) {
            inner.map.insert(key, vector);
            return;
        }

        if inner.map.len() >= self.capacity {
            Self::evict_oldest_half(&mut inner);
        }

        inner.insertion_order.push_back(key.clone());
        inner.map.insert(key, vector);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.insertion_order.clear();
    }

    fn evict_oldest_half(inner: &mut CacheInner) {
        let to_drop = (inner.insertion_order.len() / 2).max(1);
        for _ in 0..to_drop {
            if let Some(old_key) = inner.insertion_order.pop_front() {
                inner.map.remove(&old_key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put_roundtrip() {
        let cache = EmbeddingCache::new(10);
        let key = EmbeddingCache::key_for("hello");
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), vec![1.0, 2.0]);
        assert_eq!(cache.get(&key), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_overflow_evicts_oldest_half() {
        let cache = EmbeddingCache::new(4);
        for i in 0..4 {
            cache.put(format!("k{i}"), vec![i as f32]);
        }
        assert_eq!(cache.len(), 4);

        // Fifth insert triggers eviction of the two oldest entries
        cache.put("k4".to_string(), vec![4.0]);
        assert_eq!(cache.len(), 3);
        assert!(cache.get("k0").is_none());
        assert!(cache.get("k1").is_none());
        assert!(cache.get("k3").is_some());
        assert!(cache.get("k4").is_some());
    }

    #[test]
    fn test_capacity_bound_holds_under_churn() {
        let cache = EmbeddingCache::new(100);
        for i in 0..1001 {
            cache.put(format!("text-{i}"), vec![i as f32]);
        }
        assert!(cache.len() <= 100);
    }

    #[test]
    fn test_reinsert_same_key_does_not_grow() {
        let cache = EmbeddingCache::new(4);
        for _ in 0..10 {
            cache.put("same".to_string(), vec![1.0]);
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_for_is_content_hash() {
        assert_eq!(EmbeddingCache::key_for("abc"), EmbeddingCache::key_for("abc"));
        assert_ne!(EmbeddingCache::key_for("abc"), EmbeddingCache::key_for("abd"));
    }
}
