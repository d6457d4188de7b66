use lazy_static::lazy_static;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;

use crate::models::FeatureSet;

// Default cache size limits
pub const DEFAULT_MAX_RASTER_TILES: usize = 50;
pub const DEFAULT_MAX_FEATURE_SETS: usize = 50;

// A downloaded terrain image, decoded to interleaved 8-bit samples
#[derive(Clone, Debug, PartialEq)]
pub struct RasterTile {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixels: Vec<u8>,
}

struct Entry<T> {
    value: T,
    // Insertion order, used for eviction
    sequence: u64,
}

// Module state to keep cached resources. Entries are keyed by
// `cache_keys::make_tile_key`, so a hit is only possible for the same
// centre and radius and never changes what the pipeline produces.
pub struct ModuleState {
    // Cache for downloaded terrain rasters
    raster_tiles: HashMap<String, Entry<RasterTile>>,

    // Cache for polygonized, centred terrain derived from those rasters
    terrain_features: HashMap<String, Entry<FeatureSet>>,

    // Configuration for cache limits
    pub max_raster_tiles: usize,
    pub max_feature_sets: usize,

    // Stats
    pub cache_hits: usize,
    pub cache_misses: usize,

    next_sequence: u64,
}

// Create a global static instance of the module state
lazy_static! {
    static ref MODULE_STATE: ReentrantMutex<RefCell<ModuleState>> =
        ReentrantMutex::new(RefCell::new(ModuleState::new()));
}

fn evict_oldest<T>(map: &mut HashMap<String, Entry<T>>) {
    let oldest_key = map
        .iter()
        .min_by_key(|(_, entry)| entry.sequence)
        .map(|(k, _)| k.clone());
    if let Some(oldest) = oldest_key {
        map.remove(&oldest);
    }
}

impl ModuleState {
    pub fn new() -> Self {
        ModuleState {
            raster_tiles: HashMap::new(),
            terrain_features: HashMap::new(),
            max_raster_tiles: DEFAULT_MAX_RASTER_TILES,
            max_feature_sets: DEFAULT_MAX_FEATURE_SETS,
            cache_hits: 0,
            cache_misses: 0,
            next_sequence: 0,
        }
    }

    pub fn with_mut<F, R>(f: F) -> R
    where
        F: FnOnce(&mut ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let mut borrow = guard.borrow_mut();
        f(&mut borrow)
    }

    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let borrow = guard.borrow();
        f(&borrow)
    }

    fn bump_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    // Add a raster tile to the cache, evicting the oldest one at capacity
    pub fn add_raster_tile(&mut self, key: String, tile: RasterTile) {
        if self.raster_tiles.len() >= self.max_raster_tiles && !self.raster_tiles.contains_key(&key) {
            evict_oldest(&mut self.raster_tiles);
        }
        let sequence = self.bump_sequence();
        self.raster_tiles.insert(key, Entry { value: tile, sequence });
    }

    // Get a raster tile from the cache
    pub fn get_raster_tile(&mut self, key: &str) -> Option<&RasterTile> {
        if self.raster_tiles.contains_key(key) {
            self.cache_hits += 1;
            self.raster_tiles.get(key).map(|entry| &entry.value)
        } else {
            self.cache_misses += 1;
            None
        }
    }

    // Store terrain features derived from a cached raster
    pub fn add_terrain_features(&mut self, key: String, features: FeatureSet) {
        if self.terrain_features.len() >= self.max_feature_sets && !self.terrain_features.contains_key(&key) {
            evict_oldest(&mut self.terrain_features);
        }
        let sequence = self.bump_sequence();
        self.terrain_features.insert(key, Entry { value: features, sequence });
    }

    pub fn get_terrain_features(&mut self, key: &str) -> Option<&FeatureSet> {
        if self.terrain_features.contains_key(key) {
            self.cache_hits += 1;
            self.terrain_features.get(key).map(|entry| &entry.value)
        } else {
            self.cache_misses += 1;
            None
        }
    }

    // Get cache statistics: (rasters, feature sets, max rasters, total requests)
    pub fn get_stats(&self) -> (usize, usize, usize, usize) {
        (
            self.raster_tiles.len(),
            self.terrain_features.len(),
            self.max_raster_tiles,
            self.cache_hits + self.cache_misses,
        )
    }

    // Clear all caches
    pub fn clear_all_caches(&mut self) {
        self.raster_tiles.clear();
        self.terrain_features.clear();
        // Reset stats
        self.cache_hits = 0;
        self.cache_misses = 0;
    }
}

impl Default for ModuleState {
    fn default() -> Self {
        Self::new()
    }
}
