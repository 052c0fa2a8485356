//! LRU cache for classification results.
//!
//! Keys are the MD5 of the normalized message (lowercased, whitespace
//! collapsed) so trivial phrasing differences share an entry. The cache is
//! the only process-wide mutable state in this crate and is internally
//! locked.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use md5::{Digest, Md5};
use sage_core::Intent;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// 0.0 – 1.0.
    pub hit_rate: f64,
}

struct Inner {
    cache: LruCache<String, Vec<Intent>>,
    hits: u64,
    misses: u64,
}

pub struct ClassificationCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl ClassificationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                cache: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
                hits: 0,
                misses: 0,
            }),
            capacity,
        }
    }

    fn key(message: &str) -> String {
        let normalized = message
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        format!("{:x}", Md5::digest(normalized.as_bytes()))
    }

    pub fn get(&self, message: &str) -> Option<Vec<Intent>> {
        let key = Self::key(message);
        let mut inner = self.inner.lock().unwrap();
        match inner.cache.get(&key).cloned() {
            Some(intents) => {
                inner.hits += 1;
                Some(intents)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn set(&self, message: &str, intents: Vec<Intent>) {
        let key = Self::key(message);
        let mut inner = self.inner.lock().unwrap();
        inner.cache.put(key, intents);
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        let total = inner.hits + inner.misses;
        CacheStats {
            size: inner.cache.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if total > 0 {
                inner.hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_merges_case_and_whitespace_variants() {
        let cache = ClassificationCache::new(10);
        cache.set("Research   This Topic", vec![Intent::Research]);
        assert_eq!(
            cache.get("research this topic"),
            Some(vec![Intent::Research])
        );
    }

    #[test]
    fn hits_plus_misses_equals_total_lookups() {
        let cache = ClassificationCache::new(10);
        cache.set("alpha", vec![Intent::Write]);

        cache.get("alpha");
        cache.get("beta");
        cache.get("alpha");
        cache.get("gamma");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits + stats.misses, 4);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = ClassificationCache::new(2);
        cache.set("one", vec![Intent::Write]);
        cache.set("two", vec![Intent::Code]);
        // Touch "one" so "two" is the LRU entry.
        cache.get("one");
        cache.set("three", vec![Intent::Plan]);

        assert!(cache.get("one").is_some());
        assert!(cache.get("two").is_none());
        assert!(cache.get("three").is_some());
    }

    #[test]
    fn second_lookup_returns_first_computation() {
        let cache = ClassificationCache::new(10);
        cache.set("remember my name", vec![Intent::Memory]);
        let first = cache.get("remember my name");
        let second = cache.get("remember my name");
        assert_eq!(first, second);
    }
}
