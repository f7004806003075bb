//! Bounded LRU cache of derived palettes
//!
//! Keyed by track identifier so rapid track navigation (skip/back) does not
//! re-run perceptual color work for tracks seen moments ago.

use crate::config::CacheConfig;
use crate::palette::Palette;
use tracing::debug;

/// Bounded LRU cache keyed by track id
///
/// Recency order is kept in a Vec (front = least recent); capacities in
/// play are small (default 20) so linear scans are fine.
#[derive(Debug)]
pub struct PaletteCache {
    entries: Vec<(String, Palette)>,
    capacity: usize,
}

impl PaletteCache {
    /// Create a cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Vec::new(),
            capacity: config.capacity.max(1),
        }
    }

    /// Look up a palette, refreshing its recency on hit
    pub fn get(&mut self, track_id: &str) -> Option<&Palette> {
        let idx = self.entries.iter().position(|(id, _)| id == track_id)?;
        let entry = self.entries.remove(idx);
        self.entries.push(entry);
        self.entries.last().map(|(_, palette)| palette)
    }

    /// Insert or replace a palette, evicting the least recently used entry
    /// on overflow
    pub fn put(&mut self, track_id: &str, palette: Palette) {
        if let Some(idx) = self.entries.iter().position(|(id, _)| id == track_id) {
            self.entries.remove(idx);
        }
        self.entries.push((track_id.to_string(), palette));
        if self.entries.len() > self.capacity {
            let (evicted, _) = self.entries.remove(0);
            debug!("Palette cache evicted {}", evicted);
        }
    }

    /// Number of cached palettes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all cached palettes
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for PaletteCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
