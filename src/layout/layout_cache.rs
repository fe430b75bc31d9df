use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::trace;
use xxhash_rust::xxh3::xxh3_64;

use crate::layout::masonry::{Assignment, MasonryLayout};
use crate::layout::LayoutConfig;
use crate::models::{Artwork, ColumnModel};

/// Maximum number of cached layouts to keep in memory.
const MAX_CACHE_ENTRIES: usize = 8;

/// Key for the layout cache, combining the placement-relevant config and the list hash.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct CacheKey {
    config_hash: u64,
    list_hash: u64,
}

#[derive(Debug, Clone)]
struct CachedLayout {
    assignments: Vec<Assignment>,
    item_count: usize,
    last_used: Instant,
}

/// Memoised placements keyed by (config fingerprint, artwork list hash).
///
/// Viewport changes that stay inside one breakpoint resolve to the same
/// configuration, so they hit the cache and skip placement entirely.
pub struct LayoutCache {
    cache: RwLock<HashMap<CacheKey, CachedLayout>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::with_capacity(MAX_CACHE_ENTRIES)),
        }
    }

    /// Fingerprint of everything in `config` that affects placement, plus the strategy.
    pub fn config_hash(config: &LayoutConfig, layout: &MasonryLayout) -> u64 {
        let mut input = Vec::with_capacity(64);
        input.extend_from_slice(&config.columns.to_le_bytes());
        input.extend_from_slice(&config.gap.to_le_bytes());
        for variant in &config.card_variants {
            input.push(*variant as u8);
        }
        input.push(0xff);
        input.extend_from_slice(&config.heights.small.to_le_bytes());
        input.extend_from_slice(&config.heights.medium.to_le_bytes());
        input.extend_from_slice(&config.heights.large.to_le_bytes());
        input.push(layout.strategy as u8);
        xxh3_64(&input)
    }

    /// Hash of artwork identifiers in order; any change to the list or its order invalidates.
    pub fn compute_list_hash(artworks: &[Artwork]) -> u64 {
        let mut input = Vec::with_capacity(artworks.len() * 24);
        for artwork in artworks {
            input.extend_from_slice(artwork.id.as_bytes());
            input.push(0);
        }
        xxh3_64(&input)
    }

    pub fn get_assignments(&self, config_hash: u64, list_hash: u64) -> Option<Vec<Assignment>> {
        let key = CacheKey {
            config_hash,
            list_hash,
        };
        self.cache.read().get(&key).map(|e| e.assignments.clone())
    }

    /// Retrieve cached columns, rebuilding them from assignments. `None` on miss.
    pub fn get(
        &self,
        config_hash: u64,
        list_hash: u64,
        artworks: &[Artwork],
        config: &LayoutConfig,
        layout: &MasonryLayout,
    ) -> Option<Vec<ColumnModel>> {
        let key = CacheKey {
            config_hash,
            list_hash,
        };

        let assignments = {
            let mut cache = self.cache.write();
            let entry = cache.get_mut(&key)?;
            if entry.item_count != artworks.len() {
                return None;
            }
            entry.last_used = Instant::now();
            entry.assignments.clone()
        };

        Some(layout.columns_from_assignments(artworks, &assignments, config))
    }

    pub fn set(&self, config_hash: u64, list_hash: u64, assignments: Vec<Assignment>) {
        let key = CacheKey {
            config_hash,
            list_hash,
        };
        let entry = CachedLayout {
            item_count: assignments.len(),
            assignments,
            last_used: Instant::now(),
        };

        let mut cache = self.cache.write();
        if cache.len() >= MAX_CACHE_ENTRIES && !cache.contains_key(&key) {
            Self::evict_oldest(&mut cache);
        }
        cache.insert(key, entry);
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    fn evict_oldest(cache: &mut HashMap<CacheKey, CachedLayout>) {
        let oldest = cache.iter().min_by_key(|(_, v)| v.last_used).map(|(k, _)| *k);
        if let Some(key) = oldest {
            cache.remove(&key);
        }
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout computation with automatic cache management.
pub struct CachedLayoutComputer {
    pub layout: MasonryLayout,
    pub cache: LayoutCache,
}

impl CachedLayoutComputer {
    pub fn new(layout: MasonryLayout) -> Self {
        Self {
            layout,
            cache: LayoutCache::new(),
        }
    }

    /// Computes the columns, reusing a cached placement when config and list match.
    pub fn compute(&self, artworks: &[Artwork], config: &LayoutConfig) -> Vec<ColumnModel> {
        let config_hash = LayoutCache::config_hash(config, &self.layout);
        let list_hash = LayoutCache::compute_list_hash(artworks);

        if let Some(columns) = self.cache.get(config_hash, list_hash, artworks, config, &self.layout) {
            trace!(items = artworks.len(), "Layout cache hit");
            return columns;
        }

        let assignments = self.layout.compute_assignments(artworks.len(), config);
        let columns = self.layout.columns_from_assignments(artworks, &assignments, config);
        self.cache.set(config_hash, list_hash, assignments);
        columns
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl Default for CachedLayoutComputer {
    fn default() -> Self {
        Self::new(MasonryLayout::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::masonry::PlacementStrategy;
    use crate::layout::Breakpoint;
    use crate::models::CardVariant;

    fn make_artworks(ids: &[&str]) -> Vec<Artwork> {
        ids.iter().map(|id| Artwork::new(*id, *id, format!("/t/{id}.jpg"))).collect()
    }

    #[test]
    fn test_list_hash_consistency() {
        let artworks = make_artworks(&["a", "b"]);
        assert_eq!(
            LayoutCache::compute_list_hash(&artworks),
            LayoutCache::compute_list_hash(&artworks)
        );
    }

    #[test]
    fn test_list_hash_changes_on_order() {
        let h1 = LayoutCache::compute_list_hash(&make_artworks(&["a", "b"]));
        let h2 = LayoutCache::compute_list_hash(&make_artworks(&["b", "a"]));
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_list_hash_separates_ids() {
        let h1 = LayoutCache::compute_list_hash(&make_artworks(&["ab", "c"]));
        let h2 = LayoutCache::compute_list_hash(&make_artworks(&["a", "bc"]));
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_config_hash_ignores_animation_delay() {
        let layout = MasonryLayout::default();
        let a = LayoutConfig::base(Breakpoint::Desktop);
        let mut b = a.clone();
        b.animation_delay = std::time::Duration::ZERO;
        assert_eq!(LayoutCache::config_hash(&a, &layout), LayoutCache::config_hash(&b, &layout));

        b.columns = 4;
        assert_ne!(LayoutCache::config_hash(&a, &layout), LayoutCache::config_hash(&b, &layout));

        let greedy = MasonryLayout::new(PlacementStrategy::ShortestColumn);
        assert_ne!(LayoutCache::config_hash(&a, &layout), LayoutCache::config_hash(&a, &greedy));
    }

    #[test]
    fn test_cache_miss_then_hit() {
        let cache = LayoutCache::new();
        assert!(cache.get_assignments(1, 2).is_none());

        let assignments = vec![Assignment {
            column: 0,
            variant: CardVariant::Small,
        }];
        cache.set(1, 2, assignments.clone());
        assert_eq!(cache.get_assignments(1, 2), Some(assignments));
    }

    #[test]
    fn test_cache_eviction() {
        let cache = LayoutCache::new();
        for i in 0..(MAX_CACHE_ENTRIES + 5) {
            cache.set(i as u64, i as u64, Vec::new());
        }
        assert!(cache.len() <= MAX_CACHE_ENTRIES);
    }

    #[test]
    fn test_item_count_mismatch_misses() {
        let computer = CachedLayoutComputer::default();
        let config = LayoutConfig::base(Breakpoint::Tablet);
        let artworks = make_artworks(&["a", "b", "c"]);
        let config_hash = LayoutCache::config_hash(&config, &computer.layout);
        let list_hash = LayoutCache::compute_list_hash(&artworks);
        computer.cache.set(config_hash, list_hash, Vec::new());

        assert!(computer
            .cache
            .get(config_hash, list_hash, &artworks, &config, &computer.layout)
            .is_none());
    }

    #[test]
    fn test_cached_layout_computer() {
        let computer = CachedLayoutComputer::default();
        let config = LayoutConfig::base(Breakpoint::Desktop);
        let artworks = make_artworks(&["a", "b", "c", "d", "e"]);

        let first = computer.compute(&artworks, &config);
        let second = computer.compute(&artworks, &config);
        assert_eq!(first, second);
        assert_eq!(computer.cache.len(), 1);

        computer.invalidate();
        assert!(computer.cache.is_empty());
    }
}
