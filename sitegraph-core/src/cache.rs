use crate::hierarchy::{HierarchyInput, UrlHierarchy, build_hierarchy};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Memoizes hierarchy construction per input list.
///
/// Owned by the caller and passed where it is needed; entries are evicted
/// least-recently-used once `capacity` distinct inputs have been seen.
/// Keyed by the full input list, so a hit always means equal inputs.
pub struct HierarchyCache {
    cache: LruCache<Vec<HierarchyInput>, Arc<UrlHierarchy>>,
    hits: usize,
    misses: usize,
}

impl HierarchyCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// The hierarchy for `entries`, built on a miss.
    pub fn get_or_build<I>(&mut self, entries: &[I]) -> Arc<UrlHierarchy>
    where
        I: Clone + Into<HierarchyInput>,
    {
        let inputs: Vec<HierarchyInput> = entries.iter().cloned().map(Into::into).collect();

        if let Some(hierarchy) = self.cache.get(&inputs) {
            self.hits += 1;
            debug!("Hierarchy cache hit ({} inputs)", inputs.len());
            return Arc::clone(hierarchy);
        }

        self.misses += 1;
        let hierarchy = Arc::new(build_hierarchy(&inputs));
        self.cache.put(inputs, Arc::clone(&hierarchy));
        hierarchy
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for HierarchyCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_returns_same_hierarchy() {
        let mut cache = HierarchyCache::default();
        let urls = ["https://example.com/", "https://example.com/a"];

        let first = cache.get_or_build(&urls);
        let second = cache.get_or_build(&urls);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_order_is_part_of_the_key() {
        let mut cache = HierarchyCache::default();
        cache.get_or_build(&["https://example.com/a", "https://example.com/b"]);
        cache.get_or_build(&["https://example.com/b", "https://example.com/a"]);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_titles_are_part_of_the_key() {
        let mut cache = HierarchyCache::default();
        let plain = [HierarchyInput::new("https://example.com/docs")];
        let titled = [HierarchyInput::new("https://example.com/docs").with_title("Documentation")];

        let first = cache.get_or_build(&plain);
        let second = cache.get_or_build(&titled);

        assert_eq!(cache.misses(), 2);
        assert_eq!(first.get("/docs").unwrap().title, "Docs");
        assert_eq!(second.get("/docs").unwrap().title, "Documentation");
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut cache = HierarchyCache::new(2);
        cache.get_or_build(&["https://example.com/1"]);
        cache.get_or_build(&["https://example.com/2"]);
        cache.get_or_build(&["https://example.com/1"]);
        cache.get_or_build(&["https://example.com/3"]);
        assert_eq!(cache.len(), 2);

        // 2 was evicted, 1 survived
        cache.get_or_build(&["https://example.com/1"]);
        assert_eq!(cache.hits(), 2);
        cache.get_or_build(&["https://example.com/2"]);
        assert_eq!(cache.misses(), 4);
    }

    #[test]
    fn test_zero_capacity_still_caches_one() {
        let mut cache = HierarchyCache::new(0);
        cache.get_or_build(&["https://example.com/"]);
        assert_eq!(cache.len(), 1);
    }
}
