//! Engine configuration
//!
//! Per-component config structs with sensible defaults, aggregated into
//! [`EngineConfig`]. All values are plain data and serialize with the rest
//! of the project state.

use serde::{Deserialize, Serialize};

/// Configuration for the palette deriver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeriverConfig {
    /// Default primary slot when every fallback is absent or malformed
    pub default_primary: String,
    /// Default secondary slot
    pub default_secondary: String,
    /// Default accent slot
    pub default_accent: String,
    /// Base background used for shadow derivation when the render surface
    /// has no readable background value yet
    pub default_base_background: String,
}

impl Default for DeriverConfig {
    fn default() -> Self {
        Self {
            default_primary: "#ca9ee6".to_string(),
            default_secondary: "#8caaee".to_string(),
            default_accent: "#f4b8e4".to_string(),
            default_base_background: "#303446".to_string(),
        }
    }
}

/// Configuration for the music state tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Capacity of the musical memory ring buffer
    pub memory_capacity: usize,
    /// Geometric decay applied to the beat pulse on every tick without an
    /// onset
    pub pulse_decay: f32,
    /// Floor for incoming bpm (avoids division by zero in cycle math)
    pub min_bpm: f32,
    /// Ceiling for incoming bpm
    pub max_bpm: f32,
    /// Amplitude of the breathing sinusoid around 1.0
    pub breathing_amplitude: f32,
    /// Lower clamp of the breathing scale
    pub breathing_min: f32,
    /// Upper clamp of the breathing scale
    pub breathing_max: f32,
    /// Beats per full breathing cycle
    pub beats_per_breath: f32,
    /// Number of recent snapshots in the momentum energy window
    pub momentum_window: usize,
    /// Smoothing factor for the momentum signal (0 = raw delta)
    pub momentum_smoothing: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 50,
            pulse_decay: 0.9,
            min_bpm: 20.0,
            max_bpm: 300.0,
            breathing_amplitude: 0.05,
            breathing_min: 0.95,
            breathing_max: 1.05,
            beats_per_breath: 4.0,
            momentum_window: 10,
            momentum_smoothing: 0.7,
        }
    }
}

/// Configuration for the variable write batcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Hard cap on pending writes per flush cycle; excess low-priority
    /// entries beyond this are dropped
    pub max_pending: usize,
    /// Low-priority writes flush only every Kth cycle
    pub low_cadence: u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_pending: 500,
            low_cadence: 4,
        }
    }
}

/// Configuration for the palette cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached palettes
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 20 }
    }
}

/// Aggregate engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Palette deriver settings
    #[serde(default)]
    pub deriver: DeriverConfig,
    /// Music tracker settings
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Write batcher settings
    #[serde(default)]
    pub batcher: BatcherConfig,
    /// Palette cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Seconds the engine waits for an extraction reply before falling back
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: f64,
}

fn default_extraction_timeout() -> f64 {
    3.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deriver: DeriverConfig::default(),
            tracker: TrackerConfig::default(),
            batcher: BatcherConfig::default(),
            cache: CacheConfig::default(),
            extraction_timeout_secs: default_extraction_timeout(),
        }
    }
}
