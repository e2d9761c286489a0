//! Size-bounded LRU caches for open documents and extracted content.

use lru::LruCache;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

/// Key of an extracted section's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub spec: String,
    pub section: String,
    pub start_page: usize,
    pub end_page: usize,
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}",
            self.spec, self.section, self.start_page, self.end_page
        )
    }
}

/// Thread-safe LRU cache returning clones of its values.
///
/// Store `Arc`s for values that are expensive to clone. Evicting an entry
/// drops the cache's handle to it.
pub struct BoundedCache<K, V> {
    name: &'static str,
    cache: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq + fmt::Display, V: Clone> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get a value, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.cache.lock().ok()?;
        let value = cache.get(key).cloned();
        if value.is_some() {
            debug!(cache = self.name, key = %key, "Cache hit");
        }
        value
    }

    /// Insert a value, evicting the least recently used entry when full.
    pub fn put(&self, key: K, value: V) {
        if let Ok(mut cache) = self.cache.lock() {
            let replacing = cache.contains(&key);
            if let Some((evicted, _)) = cache.push(key, value) {
                if !replacing {
                    debug!(cache = self.name, key = %evicted, "Evicted");
                }
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.contains(key))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        match self.cache.lock() {
            Ok(cache) => CacheStats {
                size: cache.len(),
                capacity: cache.cap().get(),
            },
            Err(_) => CacheStats {
                size: 0,
                capacity: 0,
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,

    /// Maximum capacity
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_evicts_least_recently_used() {
        let cache: BoundedCache<String, i32> = BoundedCache::new("test", 2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);

        // Touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        cache.put("c".to_string(), 3);

        assert!(cache.contains(&"a".to_string()));
        assert!(!cache.contains(&"b".to_string()));
        assert!(cache.contains(&"c".to_string()));
        assert_eq!(cache.stats(), CacheStats { size: 2, capacity: 2 });
    }

    #[test]
    fn test_put_replaces_existing() {
        let cache: BoundedCache<String, i32> = BoundedCache::new("test", 2);
        cache.put("a".to_string(), 1);
        cache.put("a".to_string(), 5);
        assert_eq!(cache.get(&"a".to_string()), Some(5));
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_eviction_releases_handle() {
        let cache: BoundedCache<String, Arc<String>> = BoundedCache::new("docs", 1);
        let doc = Arc::new("document".to_string());
        cache.put("one".to_string(), Arc::clone(&doc));
        assert_eq!(Arc::strong_count(&doc), 2);

        cache.put("two".to_string(), Arc::new("other".to_string()));
        assert_eq!(Arc::strong_count(&doc), 1);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache: BoundedCache<String, i32> = BoundedCache::new("test", 0);
        cache.put("a".to_string(), 1);
        assert_eq!(cache.stats().capacity, 1);
        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_content_key_display() {
        let key = ContentKey {
            spec: "pdf17".to_string(),
            section: "7.3".to_string(),
            start_page: 20,
            end_page: 24,
        };
        assert_eq!(key.to_string(), "pdf17:7.3:20-24");
    }
}
