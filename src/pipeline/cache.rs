use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{BridgeResult, CacheKey};

/// Bounded least-recently-used cache of completed results.
///
/// Values are cloned on both read and write. The clone is a deep copy
/// (results own all of their strings and vectors), which is load-bearing:
/// callers mutate returned results freely — e.g. to attach mitigation
/// metadata — without corrupting the cached copy.
pub struct ResultCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<CacheKey, BridgeResult>,
    // Recency order, least-recently-used at the front.
    order: Vec<CacheKey>,
}

impl ResultCache {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Look up a result, marking the entry most-recently-used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<BridgeResult> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if !inner.entries.contains_key(key) {
            return None;
        }
        touch(&mut inner.order, key);
        inner.entries.get(key).cloned()
    }

    /// Store a result, evicting the least-recently-used entry when full.
    pub fn set(&self, key: CacheKey, value: &BridgeResult) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.insert(key.clone(), value.clone());
        touch(&mut inner.order, &key);

        if inner.entries.len() > self.capacity {
            let evicted = inner.order.remove(0);
            inner.entries.remove(&evicted);
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn touch(order: &mut Vec<CacheKey>, key: &CacheKey) {
    if let Some(position) = order.iter().position(|k| k == key) {
        order.remove(position);
    }
    order.push(key.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BiasVerdict, Connection, ContentVerdict, FairnessReport, Level, Narrative,
    };
    use crate::stages::FairnessAuditor;

    fn sample_result(concept_a: &str, concept_b: &str) -> BridgeResult {
        let connection = Connection::fallback(concept_a, concept_b);
        let fairness: FairnessReport = FairnessAuditor::new().evaluate(&connection, "", &[]);
        BridgeResult {
            id: format!("result-{}-{}", concept_a, concept_b),
            concept_a: concept_a.to_string(),
            concept_b: concept_b.to_string(),
            level: Level::Intermediate,
            connection,
            narrative: Narrative::default(),
            bias_review: BiasVerdict::default(),
            content_review: ContentVerdict::default(),
            fairness,
            guidance: String::new(),
            bias_flag: false,
            mitigated: false,
            mitigation: None,
            timeline: Vec::new(),
        }
    }

    fn key(concept_a: &str, concept_b: &str) -> CacheKey {
        CacheKey::new(concept_a, concept_b, Level::Intermediate)
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = ResultCache::new(4);
        let k = key("a", "b");
        assert!(cache.get(&k).is_none());

        cache.set(k.clone(), &sample_result("a", "b"));
        let hit = cache.get(&k).unwrap();
        assert_eq!(hit.concept_a, "a");
    }

    #[test]
    fn test_lru_eviction_drops_oldest_untouched() {
        let cache = ResultCache::new(2);
        cache.set(key("a", "b"), &sample_result("a", "b"));
        cache.set(key("c", "d"), &sample_result("c", "d"));

        // Refresh (a, b) so (c, d) becomes the LRU entry.
        cache.get(&key("a", "b"));
        cache.set(key("e", "f"), &sample_result("e", "f"));

        assert!(cache.get(&key("c", "d")).is_none());
        assert!(cache.get(&key("a", "b")).is_some());
        assert!(cache.get(&key("e", "f")).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_returned_copy_is_isolated_from_cache() {
        let cache = ResultCache::new(2);
        let k = key("a", "b");
        cache.set(k.clone(), &sample_result("a", "b"));

        let mut copy = cache.get(&k).unwrap();
        copy.mitigated = true;
        copy.guidance.push_str("mutated");

        let fresh = cache.get(&k).unwrap();
        assert!(!fresh.mitigated);
        assert!(fresh.guidance.is_empty());
    }

    #[test]
    fn test_overwrite_same_key_does_not_grow() {
        let cache = ResultCache::new(2);
        let k = key("a", "b");
        cache.set(k.clone(), &sample_result("a", "b"));
        cache.set(k.clone(), &sample_result("a", "b"));
        assert_eq!(cache.len(), 1);
    }
}
