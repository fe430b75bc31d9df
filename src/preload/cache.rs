//! Memory cache of decoded images.
//!
//! - LRU of decoded RGBA buffers with a configurable memory budget
//! - Keys are xxhash of the image URL
//!
//! Clones share the same underlying storage, so the queue workers and the
//! gallery see one cache. Locks are always taken byte counter first, then LRU.

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

/// Default memory budget in megabytes.
pub const DEFAULT_MAX_MEMORY_MB: usize = 64;

/// Minimum memory budget in megabytes.
const MIN_MEMORY_MB: usize = 16;

/// Maximum memory budget in megabytes.
const MAX_MEMORY_MB: usize = 512;

/// Bytes per pixel of a decoded RGBA buffer.
const BYTES_PER_PIXEL: usize = 4;

/// Upper bound on entries regardless of size.
const LRU_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: u64,
}

impl CacheKey {
    pub fn new(url: &str) -> Self {
        Self {
            hash: xxh3_64(url.trim().as_bytes()),
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub memory_bytes: usize,
    pub pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            width,
            height,
            memory_bytes: width as usize * height as usize * BYTES_PER_PIXEL,
            pixels: Arc::new(pixels),
        }
    }
}

#[derive(Clone)]
pub struct ImageCache {
    max_memory_bytes: usize,
    current_memory_bytes: Arc<RwLock<usize>>,
    memory_cache: Arc<RwLock<LruCache<u64, DecodedImage>>>,
}

impl ImageCache {
    /// Create a cache with a memory budget, clamped to a sane range.
    pub fn new(max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);
        debug!(max_memory_mb, "Initialized image cache");
        Self {
            max_memory_bytes: max_memory_mb * 1024 * 1024,
            current_memory_bytes: Arc::new(RwLock::new(0)),
            memory_cache: Arc::new(RwLock::new(LruCache::new(
                NonZeroUsize::new(LRU_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ))),
        }
    }

    pub fn get(&self, url: &str) -> Option<DecodedImage> {
        let key = CacheKey::new(url);
        self.memory_cache.write().get(&key.hash).cloned()
    }

    /// Check without touching recency.
    pub fn contains(&self, url: &str) -> bool {
        self.memory_cache.read().contains(&CacheKey::new(url).hash)
    }

    pub fn insert(&self, url: &str, image: DecodedImage) {
        let key = CacheKey::new(url);
        let new_size = image.memory_bytes;
        if new_size > self.max_memory_bytes {
            trace!(url, new_size, "Image larger than cache budget, not cached");
            return;
        }

        self.evict_if_needed(new_size);

        let mut current = self.current_memory_bytes.write();
        let mut cache = self.memory_cache.write();
        if let Some((_, old)) = cache.push(key.hash, image) {
            *current = current.saturating_sub(old.memory_bytes);
        }
        *current += new_size;
    }

    /// Evict least recently used entries until `needed_bytes` fit.
    fn evict_if_needed(&self, needed_bytes: usize) {
        let mut current = self.current_memory_bytes.write();
        if *current + needed_bytes <= self.max_memory_bytes {
            return;
        }

        let mut cache = self.memory_cache.write();
        while *current + needed_bytes > self.max_memory_bytes {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current = current.saturating_sub(evicted.memory_bytes);
                    trace!(
                        evicted_bytes = evicted.memory_bytes,
                        current_bytes = *current,
                        "Evicted image from memory cache"
                    );
                }
                None => break,
            }
        }
    }

    pub fn remove(&self, url: &str) -> bool {
        let key = CacheKey::new(url);
        let mut current = self.current_memory_bytes.write();
        let evicted = self.memory_cache.write().pop(&key.hash);
        match evicted {
            Some(evicted) => {
                *current = current.saturating_sub(evicted.memory_bytes);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut current = self.current_memory_bytes.write();
        self.memory_cache.write().clear();
        *current = 0;
        debug!("Cleared image cache");
    }

    pub fn memory_usage(&self) -> usize {
        *self.current_memory_bytes.read()
    }

    pub fn len(&self) -> usize {
        self.memory_cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory_cache.read().is_empty()
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_MB)
    }
}
